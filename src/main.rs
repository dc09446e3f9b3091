//! aulacache - a terminal client for a school-management REST API.
//!
//! The client signs in against the remote service, caches what it fetches
//! for offline use, computes grade statistics locally, and renders
//! role-appropriate views as plain-text reports and CSV exports.

mod api;
mod app;
mod auth;
mod cache;
mod config;
mod export;
mod grades;
mod models;
mod report;
mod summaries;
mod utils;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use api::{AsistenciaFilters, ParticipacionFilters};
use app::App;
use models::{
    AsistenciaInput, ComponentScores, EstadoAsistencia, MateriaInput, NotaInput,
    ParticipacionInput, TipoParticipacion, UsuarioBase,
};

#[derive(Parser)]
#[command(
    name = "aulacache",
    version,
    about = "Cliente de terminal para el sistema de gestión escolar"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Ignore cached data and refetch from the service
    #[arg(long, global = true)]
    refresh: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Iniciar sesión contra el servicio
    Login {
        #[arg(long)]
        username: Option<String>,
        /// No guardar la contraseña en el llavero del sistema
        #[arg(long)]
        no_remember: bool,
    },
    /// Cerrar la sesión y olvidar las credenciales
    Logout,
    /// Dashboard según el rol de la sesión
    Dashboard,
    /// Registro de notas por materia, curso y periodo
    Notas {
        #[command(subcommand)]
        command: NotasCommand,
    },
    /// Estadísticas de una materia en un periodo
    Estadisticas {
        #[arg(long)]
        materia: Option<i64>,
        #[arg(long)]
        periodo: Option<i64>,
    },
    /// Reporte trimestral de un curso
    Reporte {
        #[arg(long)]
        curso: Option<i64>,
        #[arg(long)]
        periodo: Option<i64>,
    },
    /// Promedios anuales por materia de un estudiante
    Promedios {
        /// Requerido para personal administrativo y docente
        #[arg(long)]
        estudiante: Option<i64>,
    },
    /// Listado de cursos
    Cursos,
    /// Administración de estudiantes
    Estudiantes {
        #[command(subcommand)]
        command: EstudiantesCommand,
    },
    /// Administración de materias
    Materias {
        #[command(subcommand)]
        command: MateriasCommand,
    },
    /// Registro de asistencias
    Asistencias {
        #[command(subcommand)]
        command: AsistenciasCommand,
    },
    /// Registro de participaciones
    Participaciones {
        #[command(subcommand)]
        command: ParticipacionesCommand,
    },
    /// Exportar tablas a CSV
    Exportar {
        #[command(subcommand)]
        command: ExportarCommand,
    },
    /// Estado y limpieza del cache local
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Subcommand)]
enum NotasCommand {
    /// Tabla de calificaciones del curso seleccionado
    List {
        #[arg(long)]
        materia: Option<i64>,
        #[arg(long)]
        curso: Option<i64>,
        #[arg(long)]
        periodo: Option<i64>,
    },
    /// Registrar o actualizar la calificación de un estudiante
    Set {
        #[arg(long)]
        estudiante: i64,
        #[arg(long)]
        materia: i64,
        #[arg(long)]
        periodo: i64,
        /// Saber Ser (máx. 10)
        #[arg(long)]
        ser: f64,
        /// Saber Decidir (máx. 10)
        #[arg(long)]
        decidir: f64,
        /// Saber Hacer (máx. 35)
        #[arg(long)]
        hacer: f64,
        /// Saber Conocer (máx. 35)
        #[arg(long)]
        saber: f64,
        /// Autoevaluación Ser (máx. 5)
        #[arg(long, default_value_t = 0.0)]
        auto_ser: f64,
        /// Autoevaluación Decidir (máx. 5)
        #[arg(long, default_value_t = 0.0)]
        auto_decidir: f64,
        #[arg(long)]
        comentario: Option<String>,
    },
    /// Eliminar una calificación por id
    Eliminar {
        id: i64,
    },
}

#[derive(Subcommand)]
enum EstudiantesCommand {
    List {
        #[arg(long)]
        curso: Option<i64>,
    },
    Crear {
        #[arg(long)]
        username: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        curso: Option<i64>,
        /// Contraseña inicial; se pide interactivamente si no se pasa
        #[arg(long)]
        password: Option<String>,
    },
    Editar {
        id: i64,
        #[arg(long)]
        username: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        curso: Option<i64>,
        #[arg(long)]
        inactivo: bool,
    },
    Eliminar {
        id: i64,
    },
}

#[derive(Subcommand)]
enum MateriasCommand {
    List,
    Crear {
        #[arg(long)]
        nombre: String,
        #[arg(long)]
        codigo: String,
        #[arg(long)]
        descripcion: Option<String>,
        #[arg(long)]
        profesor: Option<i64>,
    },
    Editar {
        id: i64,
        #[arg(long)]
        nombre: String,
        #[arg(long)]
        codigo: String,
        #[arg(long)]
        descripcion: Option<String>,
        #[arg(long)]
        profesor: Option<i64>,
    },
    Eliminar {
        id: i64,
    },
}

#[derive(Subcommand)]
enum AsistenciasCommand {
    List {
        #[arg(long)]
        estudiante: Option<i64>,
        #[arg(long)]
        materia: Option<i64>,
        #[arg(long)]
        curso: Option<i64>,
        #[arg(long)]
        fecha: Option<NaiveDate>,
    },
    Registrar {
        #[arg(long)]
        estudiante: i64,
        #[arg(long)]
        materia: i64,
        #[arg(long)]
        fecha: NaiveDate,
        #[arg(long, value_enum)]
        estado: EstadoArg,
    },
    Editar {
        id: i64,
        #[arg(long)]
        estudiante: i64,
        #[arg(long)]
        materia: i64,
        #[arg(long)]
        fecha: NaiveDate,
        #[arg(long, value_enum)]
        estado: EstadoArg,
    },
    Eliminar {
        id: i64,
    },
}

#[derive(Subcommand)]
enum ParticipacionesCommand {
    List {
        #[arg(long)]
        estudiante: Option<i64>,
        #[arg(long)]
        materia: Option<i64>,
        #[arg(long)]
        curso: Option<i64>,
        #[arg(long)]
        fecha: Option<NaiveDate>,
    },
    Registrar {
        #[arg(long)]
        estudiante: i64,
        #[arg(long)]
        materia: i64,
        #[arg(long)]
        fecha: NaiveDate,
        #[arg(long, value_enum)]
        tipo: TipoArg,
        /// Valor de la participación (0-10)
        #[arg(long)]
        valor: i32,
        #[arg(long)]
        descripcion: Option<String>,
    },
    Editar {
        id: i64,
        #[arg(long)]
        estudiante: i64,
        #[arg(long)]
        materia: i64,
        #[arg(long)]
        fecha: NaiveDate,
        #[arg(long, value_enum)]
        tipo: TipoArg,
        #[arg(long)]
        valor: i32,
        #[arg(long)]
        descripcion: Option<String>,
    },
    Eliminar {
        id: i64,
    },
}

#[derive(Subcommand)]
enum ExportarCommand {
    Notas {
        #[arg(long)]
        materia: Option<i64>,
        #[arg(long)]
        periodo: Option<i64>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Estadisticas {
        #[arg(long)]
        materia: Option<i64>,
        #[arg(long)]
        periodo: Option<i64>,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    Reporte {
        #[arg(long)]
        curso: Option<i64>,
        #[arg(long)]
        periodo: Option<i64>,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    Status,
    Clear,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum EstadoArg {
    Presente,
    Tardanza,
    Ausente,
    Licencia,
}

impl From<EstadoArg> for EstadoAsistencia {
    fn from(estado: EstadoArg) -> Self {
        match estado {
            EstadoArg::Presente => EstadoAsistencia::Presente,
            EstadoArg::Tardanza => EstadoAsistencia::Tardanza,
            EstadoArg::Ausente => EstadoAsistencia::Ausente,
            EstadoArg::Licencia => EstadoAsistencia::Licencia,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum TipoArg {
    Voluntaria,
    Solicitada,
    Ejercicio,
    Presentacion,
    Debate,
}

impl From<TipoArg> for TipoParticipacion {
    fn from(tipo: TipoArg) -> Self {
        match tipo {
            TipoArg::Voluntaria => TipoParticipacion::Voluntaria,
            TipoArg::Solicitada => TipoParticipacion::Solicitada,
            TipoArg::Ejercicio => TipoParticipacion::Ejercicio,
            TipoArg::Presentacion => TipoParticipacion::Presentacion,
            TipoArg::Debate => TipoParticipacion::Debate,
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Set up logging with environment-based filter
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("aulacache starting");

    let cli = Cli::parse();
    let mut app = App::new()?;

    let output = match cli.command {
        Command::Login {
            username,
            no_remember,
        } => app.login(username, !no_remember).await?,
        Command::Logout => app.logout()?,
        // Cache maintenance works without a session; everything else is
        // role-gated and needs one.
        Command::Cache { command } => match command {
            CacheCommand::Status => app.cache_status()?,
            CacheCommand::Clear => app.cache_clear()?,
        },
        other => {
            app.ensure_session().await?;
            run_command(&app, other, cli.refresh).await?
        }
    };

    println!("{}", output);
    Ok(())
}

async fn run_command(app: &App, command: Command, refresh: bool) -> Result<String> {
    match command {
        Command::Login { .. } | Command::Logout | Command::Cache { .. } => {
            unreachable!("handled before session setup")
        }
        Command::Dashboard => app.dashboard(refresh).await,
        Command::Notas { command } => match command {
            NotasCommand::List {
                materia,
                curso,
                periodo,
            } => app.notas_list(materia, curso, periodo, refresh).await,
            NotasCommand::Set {
                estudiante,
                materia,
                periodo,
                ser,
                decidir,
                hacer,
                saber,
                auto_ser,
                auto_decidir,
                comentario,
            } => {
                let input = NotaInput {
                    estudiante,
                    materia,
                    periodo,
                    puntajes: ComponentScores {
                        ser_puntaje: ser,
                        decidir_puntaje: decidir,
                        hacer_puntaje: hacer,
                        saber_puntaje: saber,
                        autoevaluacion_ser: auto_ser,
                        autoevaluacion_decidir: auto_decidir,
                    },
                    comentario,
                };
                app.nota_set(input).await
            }
            NotasCommand::Eliminar { id } => app.nota_eliminar(id).await,
        },
        Command::Estadisticas { materia, periodo } => {
            app.estadisticas(materia, periodo, refresh).await
        }
        Command::Reporte { curso, periodo } => app.reporte(curso, periodo, refresh).await,
        Command::Promedios { estudiante } => app.promedios(estudiante, refresh).await,
        Command::Cursos => app.cursos_list(refresh).await,
        Command::Estudiantes { command } => match command {
            EstudiantesCommand::List { curso } => app.estudiantes_list(curso, refresh).await,
            EstudiantesCommand::Crear {
                username,
                first_name,
                last_name,
                email,
                curso,
                password,
            } => {
                let base = UsuarioBase {
                    username,
                    email,
                    first_name,
                    last_name,
                    curso,
                    is_active: true,
                };
                app.estudiante_crear(base, password).await
            }
            EstudiantesCommand::Editar {
                id,
                username,
                first_name,
                last_name,
                email,
                curso,
                inactivo,
            } => {
                let base = UsuarioBase {
                    username,
                    email,
                    first_name,
                    last_name,
                    curso,
                    is_active: !inactivo,
                };
                app.estudiante_editar(id, base).await
            }
            EstudiantesCommand::Eliminar { id } => app.estudiante_eliminar(id).await,
        },
        Command::Materias { command } => match command {
            MateriasCommand::List => app.materias_list(refresh).await,
            MateriasCommand::Crear {
                nombre,
                codigo,
                descripcion,
                profesor,
            } => {
                app.materia_crear(MateriaInput {
                    nombre,
                    codigo,
                    descripcion,
                    profesor,
                })
                .await
            }
            MateriasCommand::Editar {
                id,
                nombre,
                codigo,
                descripcion,
                profesor,
            } => {
                app.materia_editar(
                    id,
                    MateriaInput {
                        nombre,
                        codigo,
                        descripcion,
                        profesor,
                    },
                )
                .await
            }
            MateriasCommand::Eliminar { id } => app.materia_eliminar(id).await,
        },
        Command::Asistencias { command } => match command {
            AsistenciasCommand::List {
                estudiante,
                materia,
                curso,
                fecha,
            } => {
                let filters = AsistenciaFilters {
                    estudiante,
                    materia,
                    curso,
                    fecha,
                };
                app.asistencias_list(filters, refresh).await
            }
            AsistenciasCommand::Registrar {
                estudiante,
                materia,
                fecha,
                estado,
            } => {
                let input = AsistenciaInput {
                    estudiante,
                    materia,
                    fecha,
                    estado: estado.into(),
                };
                app.asistencia_registrar(input).await
            }
            AsistenciasCommand::Editar {
                id,
                estudiante,
                materia,
                fecha,
                estado,
            } => {
                let input = AsistenciaInput {
                    estudiante,
                    materia,
                    fecha,
                    estado: estado.into(),
                };
                app.asistencia_editar(id, input).await
            }
            AsistenciasCommand::Eliminar { id } => app.asistencia_eliminar(id).await,
        },
        Command::Participaciones { command } => match command {
            ParticipacionesCommand::List {
                estudiante,
                materia,
                curso,
                fecha,
            } => {
                let filters = ParticipacionFilters {
                    estudiante,
                    materia,
                    curso,
                    fecha,
                };
                app.participaciones_list(filters, refresh).await
            }
            ParticipacionesCommand::Registrar {
                estudiante,
                materia,
                fecha,
                tipo,
                valor,
                descripcion,
            } => {
                let input = ParticipacionInput {
                    estudiante,
                    materia,
                    fecha,
                    tipo: tipo.into(),
                    valor,
                    descripcion,
                };
                app.participacion_registrar(input).await
            }
            ParticipacionesCommand::Editar {
                id,
                estudiante,
                materia,
                fecha,
                tipo,
                valor,
                descripcion,
            } => {
                let input = ParticipacionInput {
                    estudiante,
                    materia,
                    fecha,
                    tipo: tipo.into(),
                    valor,
                    descripcion,
                };
                app.participacion_editar(id, input).await
            }
            ParticipacionesCommand::Eliminar { id } => app.participacion_eliminar(id).await,
        },
        Command::Exportar { command } => match command {
            ExportarCommand::Notas {
                materia,
                periodo,
                out,
            } => app.exportar_notas(materia, periodo, out, refresh).await,
            ExportarCommand::Estadisticas {
                materia,
                periodo,
                dir,
            } => app.exportar_estadisticas(materia, periodo, dir, refresh).await,
            ExportarCommand::Reporte {
                curso,
                periodo,
                dir,
            } => app.exportar_reporte(curso, periodo, dir, refresh).await,
        },
    }
}
