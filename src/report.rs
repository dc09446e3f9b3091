//! Plain-text rendering of every view the client offers.
//!
//! Reports are built with `writeln!` into a `String` and printed by the
//! command layer. Each renderer owns its empty-state line so callers never
//! special-case missing data.

use std::collections::HashMap;
use std::fmt::Write;

use crate::cache::QueryKey;
use crate::grades;
use crate::models::{
    Asistencia, DashboardStats, EstadisticasMateria, EstudianteDashboard, Materia, Nota,
    Participacion, ReporteTrimestral, Usuario,
};
use crate::summaries::{ResumenAsistencia, ResumenParticipacion};
use crate::utils::format::{
    estado_label, format_nota, format_optional, format_porcentaje, truncate_string,
};

/// Width of the name column in tables.
const NAME_WIDTH: usize = 28;

fn name_cell(name: &str) -> String {
    format!("{:<width$}", truncate_string(name, NAME_WIDTH), width = NAME_WIDTH)
}

// ===========================================================================
// Grade registry
// ===========================================================================

/// The grade registry table: one row per enrolled student, dashes where no
/// record exists yet.
pub fn render_notas(
    titulo: &str,
    estudiantes: &[Usuario],
    notas: &[Nota],
) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Registro de Notas");
    let _ = writeln!(output, "{}", titulo);
    let _ = writeln!(output);

    if estudiantes.is_empty() {
        let _ = writeln!(output, "No hay estudiantes registrados en este curso.");
        return output;
    }

    let by_estudiante: HashMap<i64, &Nota> =
        notas.iter().map(|n| (n.estudiante, n)).collect();

    let _ = writeln!(
        output,
        "{}  {:>6} {:>8} {:>6} {:>6} {:>10}  Estado",
        name_cell("Estudiante"),
        "Ser",
        "Decidir",
        "Hacer",
        "Saber",
        "Nota Total"
    );
    for estudiante in estudiantes {
        match by_estudiante.get(&estudiante.id) {
            Some(nota) => {
                let _ = writeln!(
                    output,
                    "{}  {:>6} {:>8} {:>6} {:>6} {:>10}  {}",
                    name_cell(&estudiante.display_name()),
                    format_nota(nota.puntajes.ser_puntaje),
                    format_nota(nota.puntajes.decidir_puntaje),
                    format_nota(nota.puntajes.hacer_puntaje),
                    format_nota(nota.puntajes.saber_puntaje),
                    format_nota(nota.nota_total),
                    estado_label(nota.aprobado)
                );
            }
            None => {
                let _ = writeln!(
                    output,
                    "{}  {:>6} {:>8} {:>6} {:>6} {:>10}  {}",
                    name_cell(&estudiante.display_name()),
                    "-",
                    "-",
                    "-",
                    "-",
                    "-",
                    "sin nota"
                );
            }
        }
    }
    output
}

// ===========================================================================
// Subject statistics
// ===========================================================================

pub fn render_estadisticas(stats: &EstadisticasMateria) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Estadísticas de Materia");
    let _ = writeln!(output, "{} ({})", stats.materia_nombre, stats.periodo);
    let _ = writeln!(output);

    if stats.total_estudiantes == 0 {
        let _ = writeln!(output, "Sin calificaciones registradas para este periodo.");
        return output;
    }

    let _ = writeln!(output, "Promedio:    {}", format_nota(stats.promedio_total));
    let _ = writeln!(output, "Estudiantes: {}", stats.total_estudiantes);
    let _ = writeln!(
        output,
        "Aprobados:   {} / {} ({})",
        stats.aprobados,
        stats.total_estudiantes,
        format_porcentaje(stats.porcentaje_aprobacion)
    );
    let _ = writeln!(output, "Mayor nota:  {}", format_nota(stats.mejor_nota));
    let _ = writeln!(output, "Menor nota:  {}", format_nota(stats.peor_nota));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Promedios por dimensión");
    let dimensiones = [
        ("Ser", stats.promedios.ser, grades::MAX_SER),
        ("Saber", stats.promedios.saber, grades::MAX_SABER),
        ("Hacer", stats.promedios.hacer, grades::MAX_HACER),
        ("Decidir", stats.promedios.decidir, grades::MAX_DECIDIR),
        (
            "Auto. Ser",
            stats.promedios.autoevaluacion_ser,
            grades::MAX_AUTOEVALUACION,
        ),
        (
            "Auto. Decidir",
            stats.promedios.autoevaluacion_decidir,
            grades::MAX_AUTOEVALUACION,
        ),
    ];
    for (label, valor, maximo) in dimensiones {
        let _ = writeln!(
            output,
            "- {:<14} {} / {}",
            label,
            format_nota(valor),
            maximo
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Notas por estudiante");
    let _ = writeln!(
        output,
        "{}  {:>6} {:>6} {:>6} {:>8} {:>10}  Estado",
        name_cell("Estudiante"),
        "Ser",
        "Saber",
        "Hacer",
        "Decidir",
        "Nota Total"
    );
    for est in &stats.estudiantes {
        let _ = writeln!(
            output,
            "{}  {:>6} {:>6} {:>6} {:>8} {:>10}  {}",
            name_cell(&est.nombre),
            format_nota(est.ser),
            format_nota(est.saber),
            format_nota(est.hacer),
            format_nota(est.decidir),
            format_nota(est.nota_total),
            estado_label(est.aprobado)
        );
    }
    output
}

// ===========================================================================
// Trimester report
// ===========================================================================

pub fn render_reporte(curso_nombre: &str, reporte: &ReporteTrimestral) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Reporte Trimestral");
    let _ = writeln!(
        output,
        "{} ({} - {})",
        curso_nombre, reporte.periodo.trimestre, reporte.periodo.ano_academico
    );
    let _ = writeln!(output);

    if reporte.estudiantes.is_empty() {
        let _ = writeln!(output, "No hay estudiantes con calificaciones en este curso.");
        return output;
    }

    let curso = &reporte.estadisticas_curso;
    let _ = writeln!(output, "## Resumen del curso");
    let _ = writeln!(output, "Promedio general:    {}", format_nota(curso.promedio_general));
    let _ = writeln!(output, "Total estudiantes:   {}", reporte.total_estudiantes);
    let _ = writeln!(
        output,
        "Materias aprobadas:  {} / {} ({})",
        curso.materias_aprobadas,
        curso.total_materias,
        format_porcentaje(curso.porcentaje_aprobacion)
    );
    let _ = writeln!(output, "Materias reprobadas: {}", curso.materias_reprobadas);

    for estudiante in &reporte.estudiantes {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "## {} ({}) - promedio {}",
            estudiante.nombre,
            estudiante.username,
            format_nota(estudiante.promedio_general)
        );
        let _ = writeln!(
            output,
            "{}  {:>6} {:>6} {:>6} {:>8} {:>10}  Estado",
            name_cell("Materia"),
            "Ser",
            "Saber",
            "Hacer",
            "Decidir",
            "Nota Total"
        );
        for materia in &estudiante.materias {
            let _ = writeln!(
                output,
                "{}  {:>6} {:>6} {:>6} {:>8} {:>10}  {}",
                name_cell(&materia.nombre),
                format_nota(materia.ser),
                format_nota(materia.saber),
                format_nota(materia.hacer),
                format_nota(materia.decidir),
                format_nota(materia.nota_total),
                estado_label(materia.aprobado)
            );
        }
        let _ = writeln!(
            output,
            "Aprobadas: {}  Reprobadas: {}  Total: {}",
            estudiante.aprobadas, estudiante.reprobadas, estudiante.total_materias
        );
    }
    output
}

// ===========================================================================
// Dashboards
// ===========================================================================

pub fn render_dashboard_stats(stats: &DashboardStats) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Resumen General");
    let _ = writeln!(output);
    let _ = writeln!(output, "Estudiantes activos:  {}", stats.total_estudiantes);
    let _ = writeln!(output, "Materias registradas: {}", stats.total_materias);
    let _ = writeln!(output, "Promedio general:     {}", format_nota(stats.promedio_general));
    let _ = writeln!(
        output,
        "Asistencia promedio:  {}",
        format_porcentaje(stats.asistencia_promedio)
    );

    if !stats.trimestres_stats.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Promedio por trimestre");
        for trimestre in &stats.trimestres_stats {
            let _ = writeln!(
                output,
                "- {:<10} {}",
                trimestre.trimestre,
                format_nota(trimestre.promedio)
            );
        }
    }

    if !stats.materias_stats.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Rendimiento por materia");
        for materia in &stats.materias_stats {
            let _ = writeln!(
                output,
                "{}  {:>4} estudiantes  promedio {}",
                name_cell(&materia.nombre),
                materia.total_estudiantes,
                format_nota(materia.promedio_notas)
            );
        }
    }

    if !stats.predicciones_distribucion.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Predicciones de rendimiento");
        for prediccion in &stats.predicciones_distribucion {
            let _ = writeln!(
                output,
                "- {:<6} {} estudiantes",
                prediccion.nivel_rendimiento.label(),
                prediccion.cantidad
            );
        }
    }
    output
}

/// The student's own dashboard: yearly averages use the recorded-periods
/// policy of the grade aggregator.
pub fn render_estudiante_dashboard(
    nombre: &str,
    dashboard: &EstudianteDashboard,
    asistencias: &[ResumenAsistencia],
    participaciones: &[ResumenParticipacion],
) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Dashboard de {}", nombre);
    let _ = writeln!(output);

    if dashboard.notas.is_empty() {
        let _ = writeln!(output, "Aún no hay calificaciones registradas.");
    } else {
        let promedios: Vec<f64> = dashboard
            .notas
            .iter()
            .map(grades::promedio_historial)
            .collect();
        let promedio_general = if promedios.is_empty() {
            0.0
        } else {
            grades::round2(promedios.iter().sum::<f64>() / promedios.len() as f64)
        };
        let _ = writeln!(output, "Promedio general: {}", format_nota(promedio_general));
        let _ = writeln!(output, "Materias cursadas: {}", dashboard.notas.len());

        let _ = writeln!(output);
        let _ = writeln!(output, "## Notas por materia");
        let _ = writeln!(
            output,
            "{}  {:>9} {:>9} {:>9} {:>9}",
            name_cell("Materia"),
            "1er Trim",
            "2do Trim",
            "3er Trim",
            "Promedio"
        );
        for materia in &dashboard.notas {
            let nota_de = |tag: &str| {
                materia
                    .trimestres
                    .iter()
                    .find(|(key, _)| key.contains(tag))
                    .map(|(_, t)| format_nota(t.nota_total))
                    .unwrap_or_else(|| "-".to_string())
            };
            let _ = writeln!(
                output,
                "{}  {:>9} {:>9} {:>9} {:>9}",
                name_cell(&materia.nombre),
                nota_de("PRIMERO"),
                nota_de("SEGUNDO"),
                nota_de("TERCERO"),
                format_nota(grades::promedio_historial(materia))
            );
        }
    }

    if !asistencias.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Asistencia por materia");
        for resumen in asistencias {
            let _ = writeln!(
                output,
                "{}  {} ({} de {} clases)",
                name_cell(&resumen.materia_nombre),
                format_porcentaje(resumen.porcentaje),
                resumen.asistidas,
                resumen.total
            );
        }
        let _ = writeln!(
            output,
            "Asistencia promedio: {}",
            format_porcentaje(crate::summaries::promedio_asistencia(asistencias))
        );
    }

    if !participaciones.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Participaciones por materia");
        for resumen in participaciones {
            let _ = writeln!(
                output,
                "{}  {:>3} participaciones  promedio {}",
                name_cell(&resumen.materia_nombre),
                resumen.total,
                format_nota(resumen.promedio_valor)
            );
        }
    }

    if !dashboard.predicciones.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Predicción de rendimiento");
        for prediccion in &dashboard.predicciones {
            let _ = writeln!(
                output,
                "{}  {:<6} nota predicha {}  prob. aprobar {}",
                name_cell(&prediccion.materia_nombre),
                prediccion.nivel_rendimiento.label(),
                format_nota(prediccion.valor_numerico),
                format_porcentaje(prediccion.probabilidad_aprobar)
            );
        }
    }
    output
}

// ===========================================================================
// Rosters and registries
// ===========================================================================

pub fn render_estudiantes(estudiantes: &[Usuario]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Estudiantes");
    let _ = writeln!(output);
    if estudiantes.is_empty() {
        let _ = writeln!(output, "No hay estudiantes para los filtros elegidos.");
        return output;
    }
    let _ = writeln!(
        output,
        "{:>5}  {}  {:<16} {:<12} Activo",
        "ID",
        name_cell("Nombre"),
        "Usuario",
        "Curso"
    );
    for estudiante in estudiantes {
        let _ = writeln!(
            output,
            "{:>5}  {}  {:<16} {:<12} {}",
            estudiante.id,
            name_cell(&estudiante.display_name()),
            truncate_string(&estudiante.username, 16),
            truncate_string(estudiante.curso_nombre.as_deref().unwrap_or("-"), 12),
            if estudiante.is_active { "sí" } else { "no" }
        );
    }
    output
}

pub fn render_materias(materias: &[Materia]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Materias");
    let _ = writeln!(output);
    if materias.is_empty() {
        let _ = writeln!(output, "No hay materias registradas.");
        return output;
    }
    let _ = writeln!(
        output,
        "{:>5}  {}  {:<10} Profesor",
        "ID",
        name_cell("Nombre"),
        "Código"
    );
    for materia in materias {
        let _ = writeln!(
            output,
            "{:>5}  {}  {:<10} {}",
            materia.id,
            name_cell(&materia.nombre),
            materia.codigo,
            format_optional(&materia.profesor_nombre, "-")
        );
    }
    output
}

pub fn render_asistencias(eventos: &[Asistencia], resumen: &[ResumenAsistencia]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Asistencias");
    let _ = writeln!(output);
    if eventos.is_empty() {
        let _ = writeln!(output, "No hay asistencias para los filtros elegidos.");
        return output;
    }
    for evento in eventos {
        let _ = writeln!(
            output,
            "{}  {}  {}  {}",
            evento.fecha,
            name_cell(evento.estudiante_nombre.as_deref().unwrap_or("Estudiante no encontrado")),
            name_cell(evento.materia_nombre.as_deref().unwrap_or("Materia no encontrada")),
            evento.estado.label()
        );
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Porcentaje por materia");
    for materia in resumen {
        let _ = writeln!(
            output,
            "{}  {}",
            name_cell(&materia.materia_nombre),
            format_porcentaje(materia.porcentaje)
        );
    }
    output
}

pub fn render_participaciones(
    eventos: &[Participacion],
    resumen: &[ResumenParticipacion],
) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Participaciones");
    let _ = writeln!(output);
    if eventos.is_empty() {
        let _ = writeln!(output, "No hay participaciones para los filtros elegidos.");
        return output;
    }
    for evento in eventos {
        let _ = writeln!(
            output,
            "{}  {}  {}  {:>2}  {}",
            evento.fecha,
            name_cell(evento.estudiante_nombre.as_deref().unwrap_or("Estudiante no encontrado")),
            evento.tipo.label(),
            evento.valor,
            format_optional(&evento.descripcion, "")
        );
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Resumen por materia");
    for materia in resumen {
        let _ = writeln!(
            output,
            "{}  {:>3} participaciones  promedio {}",
            name_cell(&materia.materia_nombre),
            materia.total,
            format_nota(materia.promedio_valor)
        );
    }
    output
}

pub fn render_cursos(cursos: &[crate::models::Curso]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Cursos");
    let _ = writeln!(output);
    if cursos.is_empty() {
        let _ = writeln!(output, "No hay cursos registrados.");
        return output;
    }
    let _ = writeln!(output, "{:>5}  {}  Materias", "ID", name_cell("Nombre"));
    for curso in cursos {
        let _ = writeln!(
            output,
            "{:>5}  {}  {}",
            curso.id,
            name_cell(&curso.nombre),
            curso.materias.len()
        );
    }
    output
}

/// Yearly per-subject averages for one student, computed over recorded
/// periods only.
pub fn render_promedios(
    nombre: &str,
    promedios: &[grades::PromedioAnual],
    materia_nombre: impl Fn(i64) -> String,
) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Promedios anuales de {}", nombre);
    let _ = writeln!(output);
    if promedios.is_empty() {
        let _ = writeln!(output, "Aún no hay calificaciones registradas.");
        return output;
    }
    let _ = writeln!(
        output,
        "{}  {:>10} {:>10}  Estado",
        name_cell("Materia"),
        "Trimestres",
        "Promedio"
    );
    for promedio in promedios {
        let _ = writeln!(
            output,
            "{}  {:>10} {:>10}  {}",
            name_cell(&materia_nombre(promedio.materia)),
            promedio.periodos,
            format_nota(promedio.promedio),
            estado_label(grades::is_approved(promedio.promedio))
        );
    }
    output
}

pub fn render_cache_status(entries: &[(QueryKey, String)]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Cache");
    let _ = writeln!(output);
    if entries.is_empty() {
        let _ = writeln!(output, "Cache vacío.");
        return output;
    }
    for (key, age) in entries {
        let _ = writeln!(output, "{:<44} {}", key.file_name(), age);
    }
    output
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grades::{aggregate_subject, compute_total, is_approved};
    use crate::models::{ComponentScores, Role};

    fn usuario(id: i64, first: &str) -> Usuario {
        Usuario {
            id,
            username: first.to_lowercase(),
            email: None,
            first_name: first.to_string(),
            last_name: "Condori".to_string(),
            curso: Some(1),
            curso_nombre: Some("4to A".to_string()),
            is_active: true,
            role: Role::Estudiante,
        }
    }

    fn nota(estudiante: i64, total_scores: ComponentScores) -> Nota {
        let nota_total = compute_total(&total_scores).unwrap();
        Nota {
            id: estudiante,
            estudiante,
            materia: 5,
            periodo: 2,
            puntajes: total_scores,
            nota_total,
            aprobado: is_approved(nota_total),
            comentario: None,
        }
    }

    #[test]
    fn test_render_notas_marks_missing_records() {
        let estudiantes = vec![usuario(1, "Ana"), usuario(2, "Beto")];
        let notas = vec![nota(
            1,
            ComponentScores {
                ser_puntaje: 8.0,
                decidir_puntaje: 9.0,
                hacer_puntaje: 30.0,
                saber_puntaje: 28.0,
                autoevaluacion_ser: 4.0,
                autoevaluacion_decidir: 3.0,
            },
        )];
        let report = render_notas("Física - 4to A - 1er Trim", &estudiantes, &notas);
        assert!(report.contains("82.00"));
        assert!(report.contains("Aprobado"));
        assert!(report.contains("sin nota"));
    }

    #[test]
    fn test_render_notas_empty_roster() {
        let report = render_notas("Física", &[], &[]);
        assert!(report.contains("No hay estudiantes registrados"));
    }

    #[test]
    fn test_render_estadisticas_empty_state() {
        let stats = aggregate_subject("Física", "1er Trim - 2025", &[], |_| String::new());
        let report = render_estadisticas(&stats);
        assert!(report.contains("Sin calificaciones registradas"));
    }

    #[test]
    fn test_render_cache_status_empty() {
        assert!(render_cache_status(&[]).contains("Cache vacío."));
    }

    #[test]
    fn test_render_promedios_shows_period_count_and_verdict() {
        let promedios = vec![grades::PromedioAnual {
            materia: 7,
            periodos: 2,
            promedio: 61.0,
        }];
        let report = render_promedios("Ana", &promedios, |_| "Matemáticas".to_string());
        assert!(report.contains("Matemáticas"));
        assert!(report.contains("61.00"));
        assert!(report.contains("Aprobado"));
    }
}
