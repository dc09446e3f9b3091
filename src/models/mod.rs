//! Data models for the school-management service.
//!
//! This module contains all the data structures used to represent
//! service data including:
//!
//! - `Usuario`, `Role`: accounts and role-based view sets
//! - `Materia`, `Curso`, `Periodo`: the academic catalog
//! - `Nota`, `ComponentScores`: grade records and their six components
//! - `Asistencia`, `Participacion`: attendance and participation events
//! - Statistics payloads: `EstadisticasMateria`, `ReporteTrimestral`,
//!   `DashboardStats`, `EstudianteDashboard`

pub mod academic;
pub mod nota;
pub mod registro;
pub mod stats;
pub mod user;

pub use academic::{Curso, Materia, MateriaInput, Periodo, Trimestre};
pub use nota::{ComponentScores, Nota, NotaInput};
pub use registro::{
    Asistencia, AsistenciaInput, EstadoAsistencia, Participacion, ParticipacionInput,
    TipoParticipacion,
};
pub use stats::{
    AsistenciaMateria, ComponentesResumen, DashboardStats, EstadisticasCurso,
    EstadisticasMateria, EstudianteDashboard, EstudianteEstadistica, EstudianteReporte,
    MateriaNotas, MateriaReporte, NivelRendimiento, ParticipacionMateria, PeriodoReporte,
    PromediosComponentes, ReporteTrimestral, TrimestreNota,
};
pub use user::{Role, Usuario, UsuarioBase, UsuarioInput, View};
