// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Attendance state for one student on one class date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstadoAsistencia {
    #[serde(rename = "PRESENTE")]
    Presente,
    #[serde(rename = "TARDANZA")]
    Tardanza,
    #[serde(rename = "AUSENTE")]
    Ausente,
    #[serde(rename = "LICENCIA")]
    Licencia,
}

impl EstadoAsistencia {
    /// Whether this state counts toward the attended percentage.
    /// Late arrival still occupies the seat; absence and leave do not.
    pub fn asistio(&self) -> bool {
        matches!(self, EstadoAsistencia::Presente | EstadoAsistencia::Tardanza)
    }

    pub fn label(&self) -> &'static str {
        match self {
            EstadoAsistencia::Presente => "Presente",
            EstadoAsistencia::Tardanza => "Tardanza",
            EstadoAsistencia::Ausente => "Ausente",
            EstadoAsistencia::Licencia => "Licencia",
        }
    }
}

/// One attendance event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asistencia {
    pub id: i64,
    pub estudiante: i64,
    #[serde(default)]
    pub estudiante_nombre: Option<String>,
    pub materia: i64,
    #[serde(default)]
    pub materia_nombre: Option<String>,
    pub fecha: NaiveDate,
    pub estado: EstadoAsistencia,
}

/// Form payload for registering attendance.
#[derive(Debug, Clone, Serialize)]
pub struct AsistenciaInput {
    pub estudiante: i64,
    pub materia: i64,
    pub fecha: NaiveDate,
    pub estado: EstadoAsistencia,
}

/// Kind of class participation being credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TipoParticipacion {
    #[serde(rename = "VOLUNTARIA")]
    Voluntaria,
    #[serde(rename = "SOLICITADA")]
    Solicitada,
    #[serde(rename = "EJERCICIO")]
    Ejercicio,
    #[serde(rename = "PRESENTACION")]
    Presentacion,
    #[serde(rename = "DEBATE")]
    Debate,
}

impl TipoParticipacion {
    pub fn label(&self) -> &'static str {
        match self {
            TipoParticipacion::Voluntaria => "Pregunta voluntaria",
            TipoParticipacion::Solicitada => "Participación solicitada",
            TipoParticipacion::Ejercicio => "Resolución de ejercicio",
            TipoParticipacion::Presentacion => "Presentación",
            TipoParticipacion::Debate => "Debate",
        }
    }
}

/// One participation event, scored 0-10.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participacion {
    pub id: i64,
    pub estudiante: i64,
    #[serde(default)]
    pub estudiante_nombre: Option<String>,
    pub materia: i64,
    #[serde(default)]
    pub materia_nombre: Option<String>,
    pub fecha: NaiveDate,
    pub tipo: TipoParticipacion,
    pub valor: i32,
    #[serde(default)]
    pub descripcion: Option<String>,
}

/// Form payload for registering a participation.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipacionInput {
    pub estudiante: i64,
    pub materia: i64,
    pub fecha: NaiveDate,
    pub tipo: TipoParticipacion,
    pub valor: i32,
    pub descripcion: Option<String>,
}

impl ParticipacionInput {
    /// Participation scores live on a 0-10 integer scale.
    pub fn valor_valido(&self) -> bool {
        (0..=10).contains(&self.valor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estado_asistio() {
        assert!(EstadoAsistencia::Presente.asistio());
        assert!(EstadoAsistencia::Tardanza.asistio());
        assert!(!EstadoAsistencia::Ausente.asistio());
        assert!(!EstadoAsistencia::Licencia.asistio());
    }

    #[test]
    fn test_participacion_wire_shape() {
        let json = r#"{
            "id": 4, "estudiante": 9, "materia": 2,
            "fecha": "2025-05-12", "tipo": "EJERCICIO", "valor": 7,
            "descripcion": "Resolvió el sistema en pizarra"
        }"#;
        let p: Participacion = serde_json::from_str(json).unwrap();
        assert_eq!(p.tipo, TipoParticipacion::Ejercicio);
        assert_eq!(p.tipo.label(), "Resolución de ejercicio");
        assert_eq!(p.fecha, NaiveDate::from_ymd_opt(2025, 5, 12).unwrap());
    }

    #[test]
    fn test_participacion_valor_range() {
        let mut input = ParticipacionInput {
            estudiante: 1,
            materia: 1,
            fecha: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            tipo: TipoParticipacion::Voluntaria,
            valor: 10,
            descripcion: None,
        };
        assert!(input.valor_valido());
        input.valor = 11;
        assert!(!input.valor_valido());
    }
}
