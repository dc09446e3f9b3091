// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// A subject offering (e.g. "Matemáticas", code MAT-3A), taught by one
/// professor and assigned to one or more courses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Materia {
    pub id: i64,
    pub nombre: String,
    pub codigo: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    #[serde(default)]
    pub profesor: Option<i64>,
    #[serde(default)]
    pub profesor_nombre: Option<String>,
}

impl Materia {
    pub fn display(&self) -> String {
        format!("{} ({})", self.nombre, self.codigo)
    }
}

/// Form payload for creating or editing a subject.
#[derive(Debug, Clone, Serialize)]
pub struct MateriaInput {
    pub nombre: String,
    pub codigo: String,
    pub descripcion: Option<String>,
    pub profesor: Option<i64>,
}

/// A class cohort. Distinct from `Materia`: a curso groups students and
/// carries the list of subject ids taught to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Curso {
    pub id: i64,
    pub nombre: String,
    #[serde(default)]
    pub nivel: Option<String>,
    #[serde(default)]
    pub materias: Vec<i64>,
}

impl Curso {
    pub fn tiene_materia(&self, materia_id: i64) -> bool {
        self.materias.contains(&materia_id)
    }
}

/// Academic trimester within a school year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Trimestre {
    #[serde(rename = "PRIMERO")]
    Primero,
    #[serde(rename = "SEGUNDO")]
    Segundo,
    #[serde(rename = "TERCERO")]
    Tercero,
}

impl Trimestre {
    /// Short display label used in tables and chart axes.
    pub fn short_label(&self) -> &'static str {
        match self {
            Trimestre::Primero => "1er Trim",
            Trimestre::Segundo => "2do Trim",
            Trimestre::Tercero => "3er Trim",
        }
    }
}

impl std::fmt::Display for Trimestre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trimestre::Primero => write!(f, "Primer Trimestre"),
            Trimestre::Segundo => write!(f, "Segundo Trimestre"),
            Trimestre::Tercero => write!(f, "Tercer Trimestre"),
        }
    }
}

/// A grading period: one trimester of one academic year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Periodo {
    pub id: i64,
    pub trimestre: Trimestre,
    #[serde(rename = "año_academico")]
    pub ano_academico: i32,
    #[serde(default)]
    pub activo: bool,
}

impl Periodo {
    pub fn display(&self) -> String {
        format!("{} - {}", self.trimestre.short_label(), self.ano_academico)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_periodo_parses_wire_shape() {
        let json = r#"{"id": 7, "trimestre": "SEGUNDO", "año_academico": 2025, "activo": true}"#;
        let periodo: Periodo = serde_json::from_str(json).unwrap();
        assert_eq!(periodo.trimestre, Trimestre::Segundo);
        assert_eq!(periodo.ano_academico, 2025);
        assert_eq!(periodo.display(), "2do Trim - 2025");
    }

    #[test]
    fn test_trimestre_ordering() {
        assert!(Trimestre::Primero < Trimestre::Segundo);
        assert!(Trimestre::Segundo < Trimestre::Tercero);
    }

    #[test]
    fn test_curso_materia_membership() {
        let curso = Curso {
            id: 1,
            nombre: "4to A".to_string(),
            nivel: Some("Secundaria".to_string()),
            materias: vec![3, 8],
        };
        assert!(curso.tiene_materia(8));
        assert!(!curso.tiene_materia(9));
    }
}
