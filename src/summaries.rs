//! Client-side roll-ups of attendance and participation events.
//!
//! The dashboards consume these as per-subject summaries; the raw events
//! come from the service and are grouped and averaged here. Like the grade
//! aggregator, everything is a pure function and degrades to empty output
//! on empty input.

use std::collections::BTreeMap;

use crate::grades::round2;
use crate::models::{Asistencia, Participacion};

/// Attendance counts and attended percentage for one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumenAsistencia {
    pub materia: i64,
    pub materia_nombre: String,
    pub total: usize,
    pub asistidas: usize,
    pub porcentaje: f64,
}

/// Group attendance events by subject and compute the attended percentage.
/// A subject with no events never appears; callers render "no data" for it.
pub fn attendance_by_materia(eventos: &[Asistencia]) -> Vec<ResumenAsistencia> {
    let mut grupos: BTreeMap<i64, (Option<&str>, usize, usize)> = BTreeMap::new();

    for evento in eventos {
        let entry = grupos.entry(evento.materia).or_insert((None, 0, 0));
        if entry.0.is_none() {
            entry.0 = evento.materia_nombre.as_deref();
        }
        entry.1 += 1;
        if evento.estado.asistio() {
            entry.2 += 1;
        }
    }

    grupos
        .into_iter()
        .map(|(materia, (nombre, total, asistidas))| ResumenAsistencia {
            materia,
            materia_nombre: nombre.unwrap_or("Materia no encontrada").to_string(),
            total,
            asistidas,
            porcentaje: if total == 0 {
                0.0
            } else {
                round2(asistidas as f64 * 100.0 / total as f64)
            },
        })
        .collect()
}

/// Participation count and mean score for one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumenParticipacion {
    pub materia: i64,
    pub materia_nombre: String,
    pub total: usize,
    pub promedio_valor: f64,
}

/// Group participation events by subject with count and mean valor.
pub fn participation_by_materia(eventos: &[Participacion]) -> Vec<ResumenParticipacion> {
    let mut grupos: BTreeMap<i64, (Option<&str>, usize, i64)> = BTreeMap::new();

    for evento in eventos {
        let entry = grupos.entry(evento.materia).or_insert((None, 0, 0));
        if entry.0.is_none() {
            entry.0 = evento.materia_nombre.as_deref();
        }
        entry.1 += 1;
        entry.2 += evento.valor as i64;
    }

    grupos
        .into_iter()
        .map(|(materia, (nombre, total, suma))| ResumenParticipacion {
            materia,
            materia_nombre: nombre.unwrap_or("Materia no encontrada").to_string(),
            total,
            promedio_valor: if total == 0 {
                0.0
            } else {
                round2(suma as f64 / total as f64)
            },
        })
        .collect()
}

/// Mean attended percentage across subjects, for the dashboard headline.
pub fn promedio_asistencia(resumen: &[ResumenAsistencia]) -> f64 {
    if resumen.is_empty() {
        return 0.0;
    }
    round2(resumen.iter().map(|r| r.porcentaje).sum::<f64>() / resumen.len() as f64)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EstadoAsistencia, TipoParticipacion};
    use chrono::NaiveDate;

    fn asistencia(id: i64, materia: i64, estado: EstadoAsistencia) -> Asistencia {
        Asistencia {
            id,
            estudiante: 1,
            estudiante_nombre: None,
            materia,
            materia_nombre: Some(format!("Materia {}", materia)),
            fecha: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            estado,
        }
    }

    fn participacion(id: i64, materia: i64, valor: i32) -> Participacion {
        Participacion {
            id,
            estudiante: 1,
            estudiante_nombre: None,
            materia,
            materia_nombre: Some(format!("Materia {}", materia)),
            fecha: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            tipo: TipoParticipacion::Voluntaria,
            valor,
            descripcion: None,
        }
    }

    #[test]
    fn test_attendance_percentage_counts_tardanza_as_attended() {
        let eventos = vec![
            asistencia(1, 2, EstadoAsistencia::Presente),
            asistencia(2, 2, EstadoAsistencia::Tardanza),
            asistencia(3, 2, EstadoAsistencia::Ausente),
            asistencia(4, 2, EstadoAsistencia::Licencia),
        ];
        let resumen = attendance_by_materia(&eventos);
        assert_eq!(resumen.len(), 1);
        assert_eq!(resumen[0].total, 4);
        assert_eq!(resumen[0].asistidas, 2);
        assert_eq!(resumen[0].porcentaje, 50.0);
    }

    #[test]
    fn test_attendance_empty_input() {
        assert!(attendance_by_materia(&[]).is_empty());
        assert_eq!(promedio_asistencia(&[]), 0.0);
    }

    #[test]
    fn test_participation_groups_and_averages() {
        let eventos = vec![
            participacion(1, 3, 7),
            participacion(2, 3, 8),
            participacion(3, 5, 10),
        ];
        let resumen = participation_by_materia(&eventos);
        assert_eq!(resumen.len(), 2);
        assert_eq!(resumen[0].materia, 3);
        assert_eq!(resumen[0].total, 2);
        assert_eq!(resumen[0].promedio_valor, 7.5);
        assert_eq!(resumen[1].promedio_valor, 10.0);
    }

    #[test]
    fn test_promedio_asistencia_across_materias() {
        let eventos = vec![
            asistencia(1, 1, EstadoAsistencia::Presente),
            asistencia(2, 2, EstadoAsistencia::Ausente),
        ];
        let resumen = attendance_by_materia(&eventos);
        assert_eq!(promedio_asistencia(&resumen), 50.0);
    }
}
