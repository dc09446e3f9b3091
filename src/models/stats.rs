// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-component averages across a set of grade records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PromediosComponentes {
    pub ser: f64,
    pub saber: f64,
    pub hacer: f64,
    pub decidir: f64,
    pub autoevaluacion_ser: f64,
    pub autoevaluacion_decidir: f64,
}

/// One student's row inside a subject statistics block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstudianteEstadistica {
    pub estudiante_id: i64,
    pub nombre: String,
    pub ser: f64,
    pub saber: f64,
    pub hacer: f64,
    pub decidir: f64,
    pub nota_total: f64,
    pub aprobado: bool,
}

/// Statistics for one (materia, periodo): the payload the statistics tab
/// renders and exports. Computed client-side by the grade aggregator; the
/// service's statistics endpoint produces the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstadisticasMateria {
    pub materia_nombre: String,
    pub periodo: String,
    pub promedio_total: f64,
    pub total_estudiantes: usize,
    pub aprobados: usize,
    pub reprobados: usize,
    pub porcentaje_aprobacion: f64,
    pub mejor_nota: f64,
    pub peor_nota: f64,
    pub promedios: PromediosComponentes,
    pub estudiantes: Vec<EstudianteEstadistica>,
}

/// Period header of a trimester report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodoReporte {
    pub trimestre: String,
    #[serde(rename = "año_academico")]
    pub ano_academico: i32,
}

/// Course-level roll-up inside a trimester report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstadisticasCurso {
    pub promedio_general: f64,
    pub total_materias: usize,
    pub materias_aprobadas: usize,
    pub materias_reprobadas: usize,
    pub porcentaje_aprobacion: f64,
}

/// One subject row inside a student's report block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MateriaReporte {
    pub materia_id: i64,
    pub nombre: String,
    pub ser: f64,
    pub saber: f64,
    pub hacer: f64,
    pub decidir: f64,
    pub nota_total: f64,
    pub aprobado: bool,
}

/// One student's block inside a trimester report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstudianteReporte {
    pub estudiante_id: i64,
    pub nombre: String,
    pub username: String,
    pub promedio_general: f64,
    pub aprobadas: usize,
    pub reprobadas: usize,
    pub total_materias: usize,
    pub materias: Vec<MateriaReporte>,
}

/// The full per-course trimester report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporteTrimestral {
    pub periodo: PeriodoReporte,
    pub estadisticas_curso: EstadisticasCurso,
    pub total_estudiantes: usize,
    pub estudiantes: Vec<EstudianteReporte>,
}

// ---------------------------------------------------------------------------
// Precomputed dashboard payloads (consumed as-is and re-rendered)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimestreStat {
    pub trimestre: String,
    pub promedio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MateriaStat {
    pub nombre: String,
    pub total_estudiantes: usize,
    pub promedio_notas: f64,
}

/// Predicted performance band from the service's prediction endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NivelRendimiento {
    #[serde(rename = "ALTO")]
    Alto,
    #[serde(rename = "MEDIO")]
    Medio,
    #[serde(rename = "BAJO")]
    Bajo,
}

impl NivelRendimiento {
    pub fn label(&self) -> &'static str {
        match self {
            NivelRendimiento::Alto => "ALTO",
            NivelRendimiento::Medio => "MEDIO",
            NivelRendimiento::Bajo => "BAJO",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrediccionDistribucion {
    pub nivel_rendimiento: NivelRendimiento,
    pub cantidad: usize,
}

/// Global dashboard payload for administrative and teaching staff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_estudiantes: usize,
    pub total_materias: usize,
    pub promedio_general: f64,
    pub asistencia_promedio: f64,
    #[serde(default)]
    pub trimestres_stats: Vec<TrimestreStat>,
    #[serde(default)]
    pub materias_stats: Vec<MateriaStat>,
    #[serde(default)]
    pub predicciones_distribucion: Vec<PrediccionDistribucion>,
}

/// One trimester entry inside a student's per-subject grade history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimestreNota {
    pub trimestre: String,
    #[serde(rename = "año")]
    pub ano: i32,
    pub nota_total: f64,
    pub componentes: ComponentesResumen,
}

/// Collapsed component view used by the student dashboard charts
/// (both self-evaluation scores folded into one value).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ComponentesResumen {
    pub ser: f64,
    pub saber: f64,
    pub hacer: f64,
    pub decidir: f64,
    pub autoevaluacion: f64,
}

/// A student's grade history for one subject, keyed by period label.
/// BTreeMap keeps the trimesters in a stable order for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MateriaNotas {
    pub id: i64,
    pub nombre: String,
    pub trimestres: BTreeMap<String, TrimestreNota>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsistenciaMateria {
    pub materia_nombre: String,
    pub porcentaje: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipacionMateria {
    pub materia_nombre: String,
    pub total: usize,
    pub promedio_valor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrediccionVariables {
    pub promedio_notas: f64,
    pub porcentaje_asistencia: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediccion {
    pub id: i64,
    pub materia_nombre: String,
    pub nivel_rendimiento: NivelRendimiento,
    pub valor_numerico: f64,
    pub probabilidad_aprobar: f64,
    pub variables: PrediccionVariables,
}

/// The student's own dashboard payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstudianteDashboard {
    #[serde(default)]
    pub notas: Vec<MateriaNotas>,
    #[serde(default)]
    pub asistencias: Vec<AsistenciaMateria>,
    #[serde(default)]
    pub participaciones: Vec<ParticipacionMateria>,
    #[serde(default)]
    pub predicciones: Vec<Prediccion>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estudiante_dashboard_parses_partial_payload() {
        // The service omits sections a student has no data for.
        let json = r#"{
            "notas": [{
                "id": 3, "nombre": "Física",
                "trimestres": {
                    "PRIMERO_2025": {
                        "trimestre": "PRIMERO", "año": 2025, "nota_total": 64.5,
                        "componentes": {"ser": 7.0, "saber": 22.5, "hacer": 24.0, "decidir": 6.0, "autoevaluacion": 5.0}
                    }
                }
            }],
            "asistencias": [{"materia_nombre": "Física", "porcentaje": 88.9}]
        }"#;
        let dashboard: EstudianteDashboard = serde_json::from_str(json).unwrap();
        assert_eq!(dashboard.notas.len(), 1);
        assert_eq!(dashboard.participaciones.len(), 0);
        assert_eq!(dashboard.predicciones.len(), 0);
        let trimestre = dashboard.notas[0].trimestres.get("PRIMERO_2025").unwrap();
        assert_eq!(trimestre.ano, 2025);
        assert_eq!(trimestre.componentes.autoevaluacion, 5.0);
    }

    #[test]
    fn test_nivel_rendimiento_wire_values() {
        let nivel: NivelRendimiento = serde_json::from_str("\"MEDIO\"").unwrap();
        assert_eq!(nivel, NivelRendimiento::Medio);
        assert_eq!(nivel.label(), "MEDIO");
    }
}
