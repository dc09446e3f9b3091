//! Grade computation and aggregation.
//!
//! Everything here is a pure function over its arguments: no I/O, no
//! internal state, safe to call concurrently. The module owns the grading
//! policy constants (component maxima, approval threshold, rounding) so
//! no caller re-derives them.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::{
    ComponentScores, EstadisticasCurso, EstadisticasMateria, EstudianteEstadistica,
    EstudianteReporte, Materia, MateriaNotas, MateriaReporte, Nota, Periodo, PeriodoReporte,
    PromediosComponentes, ReporteTrimestral, Trimestre, Usuario,
};

// ============================================================================
// Policy constants
// ============================================================================

/// A total at or above this value is an approved subject.
/// The single authoritative threshold; presentation layers must not
/// re-hardcode it.
pub const APPROVAL_THRESHOLD: f64 = 51.0;

/// Fixed component maxima (sum 100). There is no per-subject weighting.
pub const MAX_SER: f64 = 10.0;
pub const MAX_DECIDIR: f64 = 10.0;
pub const MAX_HACER: f64 = 35.0;
pub const MAX_SABER: f64 = 35.0;
pub const MAX_AUTOEVALUACION: f64 = 5.0;

/// Half-up rounding to 2 decimals: `floor(100x + 0.5) / 100`.
/// Scores are non-negative, so the floor form is exact half-up.
pub fn round2(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

// ============================================================================
// Validation
// ============================================================================

/// Out-of-contract input caught at the validation boundary, before any
/// aggregation runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("component {componente} out of range: {valor} (allowed 0..={maximo})")]
    ComponentOutOfRange {
        componente: &'static str,
        valor: f64,
        maximo: f64,
    },

    #[error("missing required filter: {0}")]
    MissingFilter(&'static str),
}

/// Range check for a single component score.
pub fn check_component(
    componente: &'static str,
    valor: f64,
    maximo: f64,
) -> Result<(), ValidationError> {
    if valor.is_nan() || valor < 0.0 || valor > maximo {
        return Err(ValidationError::ComponentOutOfRange {
            componente,
            valor,
            maximo,
        });
    }
    Ok(())
}

// ============================================================================
// Per-record computation
// ============================================================================

/// Sum of the six components, in [0, 100] for validated input.
///
/// Precondition: the caller has already clamped form input. This function
/// validates and fails rather than silently clamping.
pub fn compute_total(scores: &ComponentScores) -> Result<f64, ValidationError> {
    scores.validate()?;
    Ok(scores.ser_puntaje
        + scores.decidir_puntaje
        + scores.hacer_puntaje
        + scores.saber_puntaje
        + scores.autoevaluacion_ser
        + scores.autoevaluacion_decidir)
}

/// Approval verdict for a total.
pub fn is_approved(total: f64) -> bool {
    total >= APPROVAL_THRESHOLD
}

// ============================================================================
// Subject statistics
// ============================================================================

/// Statistics for one (materia, periodo) over its grade records.
///
/// Empty input yields a zeroed block (count 0, every numeric field 0) so
/// the caller can render a "no data" state instead of handling an error.
pub fn aggregate_subject(
    materia_nombre: &str,
    periodo: &str,
    notas: &[Nota],
    nombre_de: impl Fn(i64) -> String,
) -> EstadisticasMateria {
    let estudiantes: Vec<EstudianteEstadistica> = notas
        .iter()
        .map(|nota| EstudianteEstadistica {
            estudiante_id: nota.estudiante,
            nombre: nombre_de(nota.estudiante),
            ser: nota.puntajes.ser_puntaje,
            saber: nota.puntajes.saber_puntaje,
            hacer: nota.puntajes.hacer_puntaje,
            decidir: nota.puntajes.decidir_puntaje,
            nota_total: nota.nota_total,
            aprobado: nota.aprobado,
        })
        .collect();

    if notas.is_empty() {
        return EstadisticasMateria {
            materia_nombre: materia_nombre.to_string(),
            periodo: periodo.to_string(),
            promedio_total: 0.0,
            total_estudiantes: 0,
            aprobados: 0,
            reprobados: 0,
            porcentaje_aprobacion: 0.0,
            mejor_nota: 0.0,
            peor_nota: 0.0,
            promedios: PromediosComponentes::default(),
            estudiantes,
        };
    }

    let count = notas.len();
    let sum_total: f64 = notas.iter().map(|n| n.nota_total).sum();
    let mejor = notas.iter().map(|n| n.nota_total).fold(f64::MIN, f64::max);
    let peor = notas.iter().map(|n| n.nota_total).fold(f64::MAX, f64::min);
    let aprobados = notas.iter().filter(|n| n.aprobado).count();

    let mean_of = |f: fn(&ComponentScores) -> f64| {
        round2(notas.iter().map(|n| f(&n.puntajes)).sum::<f64>() / count as f64)
    };

    EstadisticasMateria {
        materia_nombre: materia_nombre.to_string(),
        periodo: periodo.to_string(),
        promedio_total: round2(sum_total / count as f64),
        total_estudiantes: count,
        aprobados,
        reprobados: count - aprobados,
        porcentaje_aprobacion: round2(aprobados as f64 * 100.0 / count as f64),
        mejor_nota: mejor,
        peor_nota: peor,
        promedios: PromediosComponentes {
            ser: mean_of(|s| s.ser_puntaje),
            saber: mean_of(|s| s.saber_puntaje),
            hacer: mean_of(|s| s.hacer_puntaje),
            decidir: mean_of(|s| s.decidir_puntaje),
            autoevaluacion_ser: mean_of(|s| s.autoevaluacion_ser),
            autoevaluacion_decidir: mean_of(|s| s.autoevaluacion_decidir),
        },
        estudiantes,
    }
}

// ============================================================================
// Trimester roll-up
// ============================================================================

/// Yearly average for one subject across the periods that have a record.
#[derive(Debug, Clone, PartialEq)]
pub struct PromedioAnual {
    pub materia: i64,
    pub periodos: usize,
    pub promedio: f64,
}

/// Per-subject average across recorded periods.
///
/// Only periods with a grade record enter the denominator: a student with
/// grades in trimesters 1 and 3 averages over two data points, not three.
/// Ungraded periods must not drag the yearly average down.
pub fn aggregate_trimesters(
    records_by_subject: &BTreeMap<i64, BTreeMap<i64, Nota>>,
) -> Vec<PromedioAnual> {
    records_by_subject
        .iter()
        .map(|(&materia, periodos)| {
            let count = periodos.len();
            let promedio = if count == 0 {
                0.0
            } else {
                round2(periodos.values().map(|n| n.nota_total).sum::<f64>() / count as f64)
            };
            PromedioAnual {
                materia,
                periodos: count,
                promedio,
            }
        })
        .collect()
}

/// Same recorded-periods-only policy applied to a student's served grade
/// history (the dashboard payload shape).
pub fn promedio_historial(historial: &MateriaNotas) -> f64 {
    let count = historial.trimestres.len();
    if count == 0 {
        return 0.0;
    }
    round2(
        historial
            .trimestres
            .values()
            .map(|t| t.nota_total)
            .sum::<f64>()
            / count as f64,
    )
}

// ============================================================================
// Course report
// ============================================================================

/// One student's subject records, already folded to one record per subject
/// by the caller.
#[derive(Debug, Clone)]
pub struct EstudianteMaterias<'a> {
    pub estudiante: &'a Usuario,
    pub notas: Vec<(&'a Materia, &'a Nota)>,
}

fn wire_trimestre(trimestre: Trimestre) -> &'static str {
    match trimestre {
        Trimestre::Primero => "PRIMERO",
        Trimestre::Segundo => "SEGUNDO",
        Trimestre::Tercero => "TERCERO",
    }
}

/// Trimester report for one course: per-student blocks plus the
/// course-level roll-up over all subject instances.
///
/// The approval flag of each record is taken as-is; the course approval
/// rate is approved instances over total instances, as a percentage, and a
/// course with no instances reports 0% rather than dividing by zero.
pub fn aggregate_course(
    periodo: &Periodo,
    alumnos: &[EstudianteMaterias<'_>],
) -> ReporteTrimestral {
    let mut total_instancias = 0usize;
    let mut instancias_aprobadas = 0usize;
    let mut suma_totales = 0.0f64;

    let estudiantes: Vec<EstudianteReporte> = alumnos
        .iter()
        .map(|alumno| {
            let materias: Vec<MateriaReporte> = alumno
                .notas
                .iter()
                .map(|(materia, nota)| MateriaReporte {
                    materia_id: materia.id,
                    nombre: materia.nombre.clone(),
                    ser: nota.puntajes.ser_puntaje,
                    saber: nota.puntajes.saber_puntaje,
                    hacer: nota.puntajes.hacer_puntaje,
                    decidir: nota.puntajes.decidir_puntaje,
                    nota_total: nota.nota_total,
                    aprobado: nota.aprobado,
                })
                .collect();

            let aprobadas = materias.iter().filter(|m| m.aprobado).count();
            let suma: f64 = materias.iter().map(|m| m.nota_total).sum();
            let promedio = if materias.is_empty() {
                0.0
            } else {
                round2(suma / materias.len() as f64)
            };

            total_instancias += materias.len();
            instancias_aprobadas += aprobadas;
            suma_totales += suma;

            EstudianteReporte {
                estudiante_id: alumno.estudiante.id,
                nombre: alumno.estudiante.full_name(),
                username: alumno.estudiante.username.clone(),
                promedio_general: promedio,
                aprobadas,
                reprobadas: materias.len() - aprobadas,
                total_materias: materias.len(),
                materias,
            }
        })
        .collect();

    let estadisticas_curso = EstadisticasCurso {
        promedio_general: if total_instancias == 0 {
            0.0
        } else {
            round2(suma_totales / total_instancias as f64)
        },
        total_materias: total_instancias,
        materias_aprobadas: instancias_aprobadas,
        materias_reprobadas: total_instancias - instancias_aprobadas,
        porcentaje_aprobacion: if total_instancias == 0 {
            0.0
        } else {
            round2(instancias_aprobadas as f64 * 100.0 / total_instancias as f64)
        },
    };

    ReporteTrimestral {
        periodo: PeriodoReporte {
            trimestre: wire_trimestre(periodo.trimestre).to_string(),
            ano_academico: periodo.ano_academico,
        },
        estadisticas_curso,
        total_estudiantes: alumnos.len(),
        estudiantes,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn scores(
        ser: f64,
        decidir: f64,
        hacer: f64,
        saber: f64,
        auto_ser: f64,
        auto_decidir: f64,
    ) -> ComponentScores {
        ComponentScores {
            ser_puntaje: ser,
            decidir_puntaje: decidir,
            hacer_puntaje: hacer,
            saber_puntaje: saber,
            autoevaluacion_ser: auto_ser,
            autoevaluacion_decidir: auto_decidir,
        }
    }

    fn nota(id: i64, estudiante: i64, puntajes: ComponentScores) -> Nota {
        let nota_total = compute_total(&puntajes).unwrap();
        Nota {
            id,
            estudiante,
            materia: 1,
            periodo: 1,
            puntajes,
            nota_total,
            aprobado: is_approved(nota_total),
            comentario: None,
        }
    }

    #[test]
    fn test_compute_total_concrete_scenario() {
        let total = compute_total(&scores(8.0, 9.0, 30.0, 28.0, 4.0, 3.0)).unwrap();
        assert_eq!(total, 82.0);
        assert!(is_approved(total));
    }

    #[test]
    fn test_compute_total_all_zero() {
        let total = compute_total(&ComponentScores::default()).unwrap();
        assert_eq!(total, 0.0);
        assert!(!is_approved(total));
    }

    #[test]
    fn test_compute_total_stays_in_range() {
        let total = compute_total(&scores(10.0, 10.0, 35.0, 35.0, 5.0, 5.0)).unwrap();
        assert_eq!(total, 100.0);
    }

    #[test]
    fn test_compute_total_rejects_out_of_range() {
        assert!(compute_total(&scores(10.01, 0.0, 0.0, 0.0, 0.0, 0.0)).is_err());
        assert!(compute_total(&scores(0.0, 0.0, -1.0, 0.0, 0.0, 0.0)).is_err());
        assert!(compute_total(&scores(0.0, 0.0, 0.0, 35.5, 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_approval_boundary() {
        assert!(!is_approved(50.99));
        assert!(is_approved(51.0));
        assert!(is_approved(51.01));
    }

    #[test]
    fn test_round2_half_up() {
        // 0.125 is exactly representable; the half rounds up, not to even.
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(50.996), 51.0);
        assert_eq!(round2(50.994), 50.99);
        assert_eq!(round2(82.0), 82.0);
    }

    #[test]
    fn test_aggregate_subject_empty_is_zeroed() {
        let stats = aggregate_subject("Química", "1er Trim - 2025", &[], |_| unreachable!());
        assert_eq!(stats.total_estudiantes, 0);
        assert_eq!(stats.promedio_total, 0.0);
        assert_eq!(stats.porcentaje_aprobacion, 0.0);
        assert_eq!(stats.mejor_nota, 0.0);
        assert_eq!(stats.peor_nota, 0.0);
        assert_eq!(stats.promedios.saber, 0.0);
        assert!(stats.promedio_total.is_finite());
        assert!(stats.estudiantes.is_empty());
    }

    #[test]
    fn test_aggregate_subject_two_records() {
        // Totals 40 and 62: mean 51, best 62, worst 40, half approved.
        let notas = vec![
            nota(1, 10, scores(4.0, 4.0, 14.0, 14.0, 2.0, 2.0)),
            nota(2, 11, scores(7.0, 7.0, 21.0, 21.0, 3.0, 3.0)),
        ];
        assert_eq!(notas[0].nota_total, 40.0);
        assert_eq!(notas[1].nota_total, 62.0);

        let stats = aggregate_subject("Física", "2do Trim - 2025", &notas, |id| {
            format!("Estudiante {}", id)
        });
        assert_eq!(stats.promedio_total, 51.0);
        assert_eq!(stats.mejor_nota, 62.0);
        assert_eq!(stats.peor_nota, 40.0);
        assert_eq!(stats.aprobados, 1);
        assert_eq!(stats.reprobados, 1);
        assert_eq!(stats.porcentaje_aprobacion, 50.0);
        assert_eq!(stats.promedios.hacer, 17.5);
        assert_eq!(stats.estudiantes[1].nombre, "Estudiante 11");
    }

    #[test]
    fn test_aggregate_subject_mean_is_order_invariant() {
        let mut notas = vec![
            nota(1, 1, scores(8.0, 6.5, 20.0, 25.0, 4.0, 4.5)),
            nota(2, 2, scores(3.0, 2.0, 10.0, 12.25, 1.0, 0.0)),
            nota(3, 3, scores(9.5, 9.0, 33.0, 31.0, 5.0, 5.0)),
        ];
        let forward = aggregate_subject("Historia", "p", &notas, |_| String::new());
        notas.reverse();
        let backward = aggregate_subject("Historia", "p", &notas, |_| String::new());
        assert_eq!(forward.promedio_total, backward.promedio_total);
        assert_eq!(forward.promedios, backward.promedios);
    }

    #[test]
    fn test_aggregate_trimesters_skips_missing_periods() {
        // Records in periods 1 and 3 but not 2: average over exactly 2.
        let mut periodos = BTreeMap::new();
        periodos.insert(1, nota(1, 5, scores(8.0, 9.0, 30.0, 28.0, 4.0, 3.0))); // 82
        periodos.insert(3, nota(2, 5, scores(4.0, 4.0, 14.0, 14.0, 2.0, 2.0))); // 40
        let mut by_subject = BTreeMap::new();
        by_subject.insert(7i64, periodos);

        let promedios = aggregate_trimesters(&by_subject);
        assert_eq!(promedios.len(), 1);
        assert_eq!(promedios[0].materia, 7);
        assert_eq!(promedios[0].periodos, 2);
        assert_eq!(promedios[0].promedio, 61.0);
    }

    #[test]
    fn test_promedio_historial_matches_roll_up_policy() {
        use crate::models::{ComponentesResumen, TrimestreNota};

        let mut trimestres = BTreeMap::new();
        for (key, total) in [("PRIMERO_2025", 82.0), ("TERCERO_2025", 40.0)] {
            trimestres.insert(
                key.to_string(),
                TrimestreNota {
                    trimestre: key.split('_').next().unwrap().to_string(),
                    ano: 2025,
                    nota_total: total,
                    componentes: ComponentesResumen::default(),
                },
            );
        }
        let historial = MateriaNotas {
            id: 7,
            nombre: "Matemáticas".to_string(),
            trimestres,
        };
        assert_eq!(promedio_historial(&historial), 61.0);
    }

    fn usuario(id: i64, nombre: &str) -> Usuario {
        Usuario {
            id,
            username: nombre.to_lowercase(),
            email: None,
            first_name: nombre.to_string(),
            last_name: "Mamani".to_string(),
            curso: Some(1),
            curso_nombre: None,
            is_active: true,
            role: Role::Estudiante,
        }
    }

    fn materia(id: i64, nombre: &str) -> Materia {
        Materia {
            id,
            nombre: nombre.to_string(),
            codigo: format!("M-{}", id),
            descripcion: None,
            profesor: None,
            profesor_nombre: None,
        }
    }

    #[test]
    fn test_aggregate_course() {
        let periodo = Periodo {
            id: 3,
            trimestre: Trimestre::Segundo,
            ano_academico: 2025,
            activo: true,
        };
        let ana = usuario(1, "Ana");
        let beto = usuario(2, "Beto");
        let mat = materia(1, "Matemáticas");
        let fis = materia(2, "Física");

        let n_ana_mat = nota(1, 1, scores(8.0, 9.0, 30.0, 28.0, 4.0, 3.0)); // 82
        let n_ana_fis = nota(2, 1, scores(4.0, 4.0, 14.0, 14.0, 2.0, 2.0)); // 40
        let n_beto_mat = nota(3, 2, scores(7.0, 7.0, 21.0, 21.0, 3.0, 3.0)); // 62

        let alumnos = vec![
            EstudianteMaterias {
                estudiante: &ana,
                notas: vec![(&mat, &n_ana_mat), (&fis, &n_ana_fis)],
            },
            EstudianteMaterias {
                estudiante: &beto,
                notas: vec![(&mat, &n_beto_mat)],
            },
        ];

        let reporte = aggregate_course(&periodo, &alumnos);
        assert_eq!(reporte.periodo.trimestre, "SEGUNDO");
        assert_eq!(reporte.periodo.ano_academico, 2025);
        assert_eq!(reporte.total_estudiantes, 2);
        assert_eq!(reporte.estadisticas_curso.total_materias, 3);
        assert_eq!(reporte.estadisticas_curso.materias_aprobadas, 2);
        assert_eq!(reporte.estadisticas_curso.materias_reprobadas, 1);
        assert_eq!(reporte.estadisticas_curso.porcentaje_aprobacion, 66.67);
        // (82 + 40 + 62) / 3
        assert_eq!(reporte.estadisticas_curso.promedio_general, 61.33);

        let ana_row = &reporte.estudiantes[0];
        assert_eq!(ana_row.promedio_general, 61.0);
        assert_eq!(ana_row.aprobadas, 1);
        assert_eq!(ana_row.reprobadas, 1);
        assert_eq!(ana_row.materias.len(), 2);
        assert_eq!(ana_row.materias[1].nombre, "Física");

        let beto_row = &reporte.estudiantes[1];
        assert_eq!(beto_row.promedio_general, 62.0);
        assert_eq!(beto_row.total_materias, 1);
    }

    #[test]
    fn test_aggregate_course_empty_has_no_nan() {
        let periodo = Periodo {
            id: 1,
            trimestre: Trimestre::Primero,
            ano_academico: 2025,
            activo: true,
        };
        let reporte = aggregate_course(&periodo, &[]);
        assert_eq!(reporte.estadisticas_curso.porcentaje_aprobacion, 0.0);
        assert_eq!(reporte.estadisticas_curso.promedio_general, 0.0);
        assert!(reporte.estadisticas_curso.promedio_general.is_finite());
    }
}
