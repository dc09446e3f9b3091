use serde::{Deserialize, Serialize};

use crate::grades::{self, ValidationError};

/// The six evaluation components of one grade record.
///
/// Component maxima are fixed policy (10/10/35/35/5/5, summing 100) and are
/// not configurable per subject. Values carry at most two decimals; the form
/// boundary normalizes input through [`ComponentScores::clamped`] before
/// anything downstream sees it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentScores {
    pub ser_puntaje: f64,
    pub decidir_puntaje: f64,
    pub hacer_puntaje: f64,
    pub saber_puntaje: f64,
    pub autoevaluacion_ser: f64,
    pub autoevaluacion_decidir: f64,
}

impl ComponentScores {
    /// Check every component against its documented range. This is the
    /// validation boundary: aggregation assumes it already ran.
    pub fn validate(&self) -> Result<(), ValidationError> {
        grades::check_component("ser_puntaje", self.ser_puntaje, grades::MAX_SER)?;
        grades::check_component("decidir_puntaje", self.decidir_puntaje, grades::MAX_DECIDIR)?;
        grades::check_component("hacer_puntaje", self.hacer_puntaje, grades::MAX_HACER)?;
        grades::check_component("saber_puntaje", self.saber_puntaje, grades::MAX_SABER)?;
        grades::check_component(
            "autoevaluacion_ser",
            self.autoevaluacion_ser,
            grades::MAX_AUTOEVALUACION,
        )?;
        grades::check_component(
            "autoevaluacion_decidir",
            self.autoevaluacion_decidir,
            grades::MAX_AUTOEVALUACION,
        )?;
        Ok(())
    }

    /// Normalize raw form input: negative values floor to 0, values above a
    /// component's maximum saturate to it, and everything rounds half-up to
    /// two decimals. Mirrors what the grade entry form does on every change.
    pub fn clamped(&self) -> Self {
        let clamp = |value: f64, max: f64| grades::round2(value.clamp(0.0, max));
        Self {
            ser_puntaje: clamp(self.ser_puntaje, grades::MAX_SER),
            decidir_puntaje: clamp(self.decidir_puntaje, grades::MAX_DECIDIR),
            hacer_puntaje: clamp(self.hacer_puntaje, grades::MAX_HACER),
            saber_puntaje: clamp(self.saber_puntaje, grades::MAX_SABER),
            autoevaluacion_ser: clamp(self.autoevaluacion_ser, grades::MAX_AUTOEVALUACION),
            autoevaluacion_decidir: clamp(self.autoevaluacion_decidir, grades::MAX_AUTOEVALUACION),
        }
    }
}

/// One grade record: the unique (estudiante, materia, periodo) triple with
/// its component scores and the service-derived total and verdict.
///
/// The record is created on the first score submission for the triple and
/// mutated by later edits; components default to 0 until set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nota {
    pub id: i64,
    pub estudiante: i64,
    pub materia: i64,
    pub periodo: i64,
    #[serde(flatten)]
    pub puntajes: ComponentScores,
    #[serde(default)]
    pub nota_total: f64,
    #[serde(default)]
    pub aprobado: bool,
    #[serde(default)]
    pub comentario: Option<String>,
}

impl Nota {
    /// Total recomputed from the components. Matches `nota_total` for any
    /// in-contract record; aggregation uses the service value and this is
    /// the cross-check.
    pub fn total_local(&self) -> Result<f64, ValidationError> {
        grades::compute_total(&self.puntajes)
    }
}

/// Form payload for registering or editing a grade.
#[derive(Debug, Clone, Serialize)]
pub struct NotaInput {
    pub estudiante: i64,
    pub materia: i64,
    pub periodo: i64,
    #[serde(flatten)]
    pub puntajes: ComponentScores,
    pub comentario: Option<String>,
}

impl NotaInput {
    /// Clamp-and-round the scores, then validate. Returns the normalized
    /// payload ready for the service.
    pub fn normalized(mut self) -> Result<Self, ValidationError> {
        self.puntajes = self.puntajes.clamped();
        self.puntajes.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_saturates_and_rounds() {
        let raw = ComponentScores {
            ser_puntaje: 12.0,
            decidir_puntaje: -3.0,
            hacer_puntaje: 30.456,
            saber_puntaje: 35.0,
            autoevaluacion_ser: 5.005,
            autoevaluacion_decidir: 4.994,
        };
        let clamped = raw.clamped();
        assert_eq!(clamped.ser_puntaje, 10.0);
        assert_eq!(clamped.decidir_puntaje, 0.0);
        assert_eq!(clamped.hacer_puntaje, 30.46);
        assert_eq!(clamped.saber_puntaje, 35.0);
        assert_eq!(clamped.autoevaluacion_ser, 5.0);
        assert_eq!(clamped.autoevaluacion_decidir, 4.99);
    }

    #[test]
    fn test_validate_rejects_out_of_contract_input() {
        let mut scores = ComponentScores::default();
        assert!(scores.validate().is_ok());

        scores.hacer_puntaje = 35.01;
        assert!(scores.validate().is_err());

        scores.hacer_puntaje = 20.0;
        scores.ser_puntaje = -0.01;
        assert!(scores.validate().is_err());
    }

    #[test]
    fn test_nota_parses_flattened_components() {
        let json = r#"{
            "id": 11, "estudiante": 3, "materia": 5, "periodo": 2,
            "ser_puntaje": 8.0, "decidir_puntaje": 9.0,
            "hacer_puntaje": 30.0, "saber_puntaje": 28.0,
            "autoevaluacion_ser": 4.0, "autoevaluacion_decidir": 3.0,
            "nota_total": 82.0, "aprobado": true,
            "comentario": "Buen desempeño"
        }"#;
        let nota: Nota = serde_json::from_str(json).unwrap();
        assert_eq!(nota.puntajes.saber_puntaje, 28.0);
        assert_eq!(nota.total_local().unwrap(), nota.nota_total);
        assert!(nota.aprobado);
    }

    #[test]
    fn test_normalized_rejects_nothing_after_clamp() {
        let input = NotaInput {
            estudiante: 1,
            materia: 1,
            periodo: 1,
            puntajes: ComponentScores {
                ser_puntaje: 99.0,
                decidir_puntaje: -1.0,
                hacer_puntaje: 35.2,
                saber_puntaje: 35.0,
                autoevaluacion_ser: 5.0,
                autoevaluacion_decidir: 0.0,
            },
            comentario: None,
        };
        let normalized = input.normalized().unwrap();
        assert_eq!(normalized.puntajes.ser_puntaje, 10.0);
        assert_eq!(normalized.puntajes.hacer_puntaje, 35.0);
    }
}
