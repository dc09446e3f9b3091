//! CSV export for tables the client renders.
//!
//! The serializer takes flat records as ordered (header, cell) pairs and
//! writes delimited text: the header row comes from the first record's
//! keys in their given order, missing or empty cells export as empty, and
//! fields containing the delimiter or quotes are quoted with embedded
//! quotes doubled.

use anyhow::{Context, Result};

use crate::models::{EstadisticasMateria, Nota, ReporteTrimestral};
use crate::utils::format::{estado_label, format_nota, format_porcentaje};

/// One flat export record with a stable column order.
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: Vec<(String, String)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, header: &str, value: impl Into<String>) {
        self.columns.push((header.to_string(), value.into()));
    }

    /// None exports as an empty cell.
    pub fn push_opt(&mut self, header: &str, value: Option<&str>) {
        self.push(header, value.unwrap_or(""));
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|(h, _)| h.as_str()).collect()
    }
}

/// Serialize records to CSV text. Column order comes from the first
/// record; later records are projected onto those headers, with absent
/// keys as empty cells. Empty input yields an empty string.
pub fn to_csv(rows: &[Row]) -> Result<String> {
    let Some(first) = rows.first() else {
        return Ok(String::new());
    };
    let headers = first.headers();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&headers)
        .context("Failed to write CSV header")?;
    for row in rows {
        let record: Vec<&str> = headers
            .iter()
            .map(|header| row.get(header).unwrap_or(""))
            .collect();
        writer
            .write_record(&record)
            .context("Failed to write CSV record")?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("Failed to flush CSV writer: {}", err))?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

// ===========================================================================
// Row builders, one per exportable table
// ===========================================================================

/// Grade registry rows: one per record, names resolved by the caller.
pub fn notas_rows(
    notas: &[Nota],
    estudiante_nombre: impl Fn(i64) -> String,
    materia_nombre: &str,
    periodo_nombre: &str,
) -> Vec<Row> {
    notas
        .iter()
        .map(|nota| {
            let mut row = Row::new();
            row.push("Estudiante", estudiante_nombre(nota.estudiante));
            row.push("Materia", materia_nombre);
            row.push("Periodo", periodo_nombre);
            row.push("Ser", format_nota(nota.puntajes.ser_puntaje));
            row.push("Decidir", format_nota(nota.puntajes.decidir_puntaje));
            row.push("Hacer", format_nota(nota.puntajes.hacer_puntaje));
            row.push("Saber", format_nota(nota.puntajes.saber_puntaje));
            row.push("Auto-Ser", format_nota(nota.puntajes.autoevaluacion_ser));
            row.push(
                "Auto-Decidir",
                format_nota(nota.puntajes.autoevaluacion_decidir),
            );
            row.push("Nota Total", format_nota(nota.nota_total));
            row.push("Estado", estado_label(nota.aprobado));
            row.push_opt("Comentario", nota.comentario.as_deref());
            row
        })
        .collect()
}

/// Subject statistics, general block (single row).
pub fn estadisticas_general_rows(stats: &EstadisticasMateria) -> Vec<Row> {
    let mut row = Row::new();
    row.push("Materia", stats.materia_nombre.as_str());
    row.push("Periodo", stats.periodo.as_str());
    row.push("Promedio_Total", format_nota(stats.promedio_total));
    row.push("Total_Estudiantes", stats.total_estudiantes.to_string());
    row.push("Aprobados", stats.aprobados.to_string());
    row.push("Reprobados", stats.reprobados.to_string());
    row.push(
        "Porcentaje_Aprobacion",
        format_porcentaje(stats.porcentaje_aprobacion),
    );
    row.push("Mejor_Nota", format_nota(stats.mejor_nota));
    row.push("Peor_Nota", format_nota(stats.peor_nota));
    vec![row]
}

/// Subject statistics, per-component averages (single row).
pub fn estadisticas_promedios_rows(stats: &EstadisticasMateria) -> Vec<Row> {
    let mut row = Row::new();
    row.push("Ser", format_nota(stats.promedios.ser));
    row.push("Saber", format_nota(stats.promedios.saber));
    row.push("Hacer", format_nota(stats.promedios.hacer));
    row.push("Decidir", format_nota(stats.promedios.decidir));
    row.push("Auto-Ser", format_nota(stats.promedios.autoevaluacion_ser));
    row.push(
        "Auto-Decidir",
        format_nota(stats.promedios.autoevaluacion_decidir),
    );
    vec![row]
}

/// Subject statistics, one row per student.
pub fn estadisticas_estudiantes_rows(stats: &EstadisticasMateria) -> Vec<Row> {
    stats
        .estudiantes
        .iter()
        .map(|est| {
            let mut row = Row::new();
            row.push("Estudiante", est.nombre.as_str());
            row.push("Ser", format_nota(est.ser));
            row.push("Saber", format_nota(est.saber));
            row.push("Hacer", format_nota(est.hacer));
            row.push("Decidir", format_nota(est.decidir));
            row.push("Nota Total", format_nota(est.nota_total));
            row.push("Estado", estado_label(est.aprobado));
            row
        })
        .collect()
}

/// Trimester report, course summary (single row).
pub fn reporte_resumen_rows(curso_nombre: &str, reporte: &ReporteTrimestral) -> Vec<Row> {
    let mut row = Row::new();
    row.push("Curso", curso_nombre);
    row.push(
        "Periodo",
        format!(
            "{} - {}",
            reporte.periodo.trimestre, reporte.periodo.ano_academico
        ),
    );
    row.push(
        "Promedio_General",
        format_nota(reporte.estadisticas_curso.promedio_general),
    );
    row.push(
        "Total_Materias",
        reporte.estadisticas_curso.total_materias.to_string(),
    );
    row.push(
        "Materias_Aprobadas",
        reporte.estadisticas_curso.materias_aprobadas.to_string(),
    );
    row.push(
        "Materias_Reprobadas",
        reporte.estadisticas_curso.materias_reprobadas.to_string(),
    );
    row.push(
        "Porcentaje_Aprobacion",
        format_porcentaje(reporte.estadisticas_curso.porcentaje_aprobacion),
    );
    row.push("Total_Estudiantes", reporte.total_estudiantes.to_string());
    vec![row]
}

/// Trimester report, one row per (student, subject) instance.
pub fn reporte_detallado_rows(reporte: &ReporteTrimestral) -> Vec<Row> {
    let mut rows = Vec::new();
    for estudiante in &reporte.estudiantes {
        for materia in &estudiante.materias {
            let mut row = Row::new();
            row.push("Estudiante", estudiante.nombre.as_str());
            row.push("Usuario", estudiante.username.as_str());
            row.push("Materia", materia.nombre.as_str());
            row.push("Ser", format_nota(materia.ser));
            row.push("Saber", format_nota(materia.saber));
            row.push("Hacer", format_nota(materia.hacer));
            row.push("Decidir", format_nota(materia.decidir));
            row.push("Nota Total", format_nota(materia.nota_total));
            row.push("Estado", estado_label(materia.aprobado));
            row.push(
                "Promedio General",
                format_nota(estudiante.promedio_general),
            );
            row.push("Materias Aprobadas", estudiante.aprobadas.to_string());
            row.push("Materias Reprobadas", estudiante.reprobadas.to_string());
            row.push("Total Materias", estudiante.total_materias.to_string());
            rows.push(row);
        }
    }
    rows
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grades::{compute_total, is_approved};
    use crate::models::ComponentScores;

    fn nota(estudiante: i64, puntajes: ComponentScores, comentario: Option<&str>) -> Nota {
        let nota_total = compute_total(&puntajes).unwrap();
        Nota {
            id: estudiante,
            estudiante,
            materia: 5,
            periodo: 2,
            puntajes,
            nota_total,
            aprobado: is_approved(nota_total),
            comentario: comentario.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_to_csv_empty_input() {
        assert_eq!(to_csv(&[]).unwrap(), "");
    }

    #[test]
    fn test_to_csv_quotes_delimiters_and_doubles_quotes() {
        let mut row = Row::new();
        row.push("Estudiante", "Mamani, Ana");
        row.push("Comentario", r#"Dijo "presente" dos veces"#);
        row.push("Nota Total", "82.00");
        let csv = to_csv(&[row]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "Estudiante,Comentario,Nota Total");
        assert_eq!(
            lines.next().unwrap(),
            r#""Mamani, Ana","Dijo ""presente"" dos veces",82.00"#
        );
    }

    #[test]
    fn test_to_csv_column_order_from_first_record() {
        let mut first = Row::new();
        first.push("B", "1");
        first.push("A", "2");
        // Second record has the keys in another order plus an extra one.
        let mut second = Row::new();
        second.push("A", "3");
        second.push("B", "4");
        second.push("C", "ignored");
        let csv = to_csv(&[first, second]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "B,A");
        assert_eq!(lines.next().unwrap(), "1,2");
        assert_eq!(lines.next().unwrap(), "4,3");
    }

    #[test]
    fn test_none_comentario_is_empty_cell() {
        let rows = notas_rows(
            &[nota(1, ComponentScores::default(), None)],
            |_| "Ana Mamani".to_string(),
            "Física",
            "1er Trim - 2025",
        );
        assert_eq!(rows[0].get("Comentario"), Some(""));
        assert_eq!(rows[0].get("Nota Total"), Some("0.00"));
        assert_eq!(rows[0].get("Estado"), Some("Reprobado"));
    }

    #[test]
    fn test_nota_total_round_trips_through_csv() {
        let puntajes = ComponentScores {
            ser_puntaje: 8.0,
            decidir_puntaje: 9.0,
            hacer_puntaje: 30.0,
            saber_puntaje: 28.0,
            autoevaluacion_ser: 4.0,
            autoevaluacion_decidir: 3.0,
        };
        let expected = format_nota(compute_total(&puntajes).unwrap());
        let rows = notas_rows(
            &[nota(1, puntajes, Some("Comentario, con coma"))],
            |_| "Ana".to_string(),
            "Física",
            "1er Trim - 2025",
        );
        let csv = to_csv(&rows).unwrap();

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let headers = reader.headers().unwrap().clone();
        let column = headers.iter().position(|h| h == "Nota Total").unwrap();
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[column], expected.as_str());
        assert_eq!(expected, "82.00");
    }
}
