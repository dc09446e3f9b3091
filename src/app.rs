//! Application state and command operations.
//!
//! `App` wires the config, session, API client, and cache together and
//! implements one operation per CLI command: fetch (through the cache),
//! aggregate, render. Mutations go straight to the service and then
//! invalidate every cached read that depended on the mutated record.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, AsistenciaFilters, ParticipacionFilters};
use crate::auth::{CredentialStore, Session};
use crate::cache::{CacheManager, QueryKey, Scope};
use crate::config::Config;
use crate::export;
use crate::grades::{self, ValidationError};
use crate::models::{
    AsistenciaInput, Curso, EstadisticasMateria, EstudianteDashboard, Materia, MateriaInput,
    Nota, NotaInput, Periodo, ReporteTrimestral, Role, Usuario, UsuarioBase, UsuarioInput, View,
};
use crate::report;
use crate::summaries;
use crate::utils::format::format_nota;

// ============================================================================
// Constants
// ============================================================================

/// Maximum concurrent API requests when fanning out per-subject fetches.
/// Keeps the course report fast without hammering a small school server.
const MAX_CONCURRENT_REQUESTS: usize = 4;

/// Sentinel labels for references that are missing from the loaded
/// collections. Rendering stays non-fatal; the label shows up instead.
const ESTUDIANTE_NO_ENCONTRADO: &str = "Estudiante no encontrado";
const MATERIA_NO_ENCONTRADA: &str = "Materia no encontrada";
const PERIODO_NO_ENCONTRADO: &str = "Periodo no encontrado";

pub struct App {
    pub config: Config,
    pub session: Session,
    pub cache: CacheManager,
    client: ApiClient,
}

// ============================================================================
// Lookup helpers (missing references degrade to sentinel labels)
// ============================================================================

fn nombre_estudiante(estudiantes: &[Usuario], id: i64) -> String {
    estudiantes
        .iter()
        .find(|e| e.id == id)
        .map(|e| e.full_name())
        .unwrap_or_else(|| ESTUDIANTE_NO_ENCONTRADO.to_string())
}

fn nombre_materia(materias: &[Materia], id: i64) -> String {
    materias
        .iter()
        .find(|m| m.id == id)
        .map(|m| m.nombre.clone())
        .unwrap_or_else(|| MATERIA_NO_ENCONTRADA.to_string())
}

fn nombre_periodo(periodos: &[Periodo], id: i64) -> String {
    periodos
        .iter()
        .find(|p| p.id == id)
        .map(|p| p.display())
        .unwrap_or_else(|| PERIODO_NO_ENCONTRADO.to_string())
}

/// File-name fragment from a display name.
fn sanitize(nombre: &str) -> String {
    nombre
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

impl App {
    pub fn new() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        let cache_dir = config.cache_dir()?;
        let cache = CacheManager::new(cache_dir.clone())?;

        let mut session = Session::new(cache_dir);
        let _ = session.load();

        let client = ApiClient::new(config.resolved_base_url())?;
        let client = match session.token() {
            Some(token) => client.with_token(token.to_string()),
            None => client,
        };

        Ok(Self {
            config,
            session,
            cache,
            client,
        })
    }

    // ========================================================================
    // Session management
    // ========================================================================

    /// Interactive login. Uses the stored keychain password when available,
    /// otherwise prompts; remembers the credentials unless told not to.
    pub async fn login(&mut self, username: Option<String>, remember: bool) -> Result<String> {
        let username = match username.or_else(|| self.config.last_username.clone()) {
            Some(username) => username,
            None => bail!("No username known; pass --username on first login"),
        };

        let credentials = CredentialStore::new(&username);
        let password = match credentials.password() {
            Ok(stored) => stored,
            Err(_) => rpassword::prompt_password(format!("Contraseña de {}: ", username))
                .context("Failed to read password")?,
        };

        let data = self.client.login(&username, &password).await?;
        info!(username = %username, role = %data.role, "Login successful");

        if remember {
            if let Err(err) = credentials.store(&password) {
                warn!(error = %err, "Could not store credentials in keychain");
            }
        }

        self.client.set_token(data.token.clone());
        let role = data.role;
        self.session.update(data);
        self.session.save()?;
        self.config.last_username = Some(username.clone());
        self.config.save()?;

        Ok(format!("Sesión iniciada como {} ({})", username, role))
    }

    /// Drop the session and forget the stored credentials.
    pub fn logout(&mut self) -> Result<String> {
        if let Some(username) = self.config.last_username.clone() {
            let _ = CredentialStore::new(username).delete();
        }
        self.session.clear()?;
        Ok("Sesión cerrada".to_string())
    }

    /// Make sure a valid session exists, re-authenticating from the
    /// keychain when the token expired.
    pub async fn ensure_session(&mut self) -> Result<()> {
        if self.session.is_valid() && !self.session.data.as_ref().is_some_and(|d| d.needs_refresh())
        {
            return Ok(());
        }

        let Some(username) = self.config.last_username.clone() else {
            bail!("No hay sesión activa; ejecute `aulacache login --username <usuario>`");
        };
        if !CredentialStore::new(&username).exists() {
            if self.session.is_valid() {
                // Near expiry but still usable and nothing to refresh with.
                return Ok(());
            }
            bail!("La sesión expiró; ejecute `aulacache login`");
        }

        debug!(username = %username, "Refreshing session from stored credentials");
        self.login(Some(username), true).await?;
        Ok(())
    }

    /// Role gate for a view: there must be a session and the role must
    /// have the view in its navigation set.
    fn require_view(&self, view: View) -> Result<(i64, Role)> {
        let Some(data) = self.session.data.as_ref() else {
            bail!("No hay sesión activa; ejecute `aulacache login`");
        };
        if !data.role.can_access(view) {
            bail!(
                "El rol {} no tiene permisos para acceder a {}",
                data.role,
                view.title()
            );
        }
        Ok((data.user_id, data.role))
    }

    // ========================================================================
    // Cached reads
    // ========================================================================

    /// Serve from cache while fresh; fetch and re-cache otherwise. A failed
    /// fetch falls back to a stale entry when one exists, so the client
    /// keeps working offline.
    async fn cached<T, F, Fut>(&self, key: &QueryKey, refresh: bool, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        if !refresh {
            if let Ok(Some(cached)) = self.cache.load::<T>(key) {
                if !cached.is_stale() {
                    debug!(key = %key.file_name(), age = %cached.age_display(), "Cache hit");
                    return Ok(cached.data);
                }
            }
        }

        match fetch().await {
            Ok(data) => {
                if let Err(err) = self.cache.save(key, &data) {
                    warn!(key = %key.file_name(), error = %err, "Failed to write cache entry");
                }
                Ok(data)
            }
            Err(err) => {
                if let Ok(Some(cached)) = self.cache.load::<T>(key) {
                    warn!(
                        key = %key.file_name(),
                        age = %cached.age_display(),
                        error = %err,
                        "Fetch failed, serving stale cache"
                    );
                    return Ok(cached.data);
                }
                Err(err)
            }
        }
    }

    async fn fetch_periodos(&self, refresh: bool) -> Result<Vec<Periodo>> {
        let key = QueryKey::new(Scope::Periodos);
        self.cached(&key, refresh, || self.client.fetch_periodos()).await
    }

    async fn fetch_cursos(&self, refresh: bool) -> Result<Vec<Curso>> {
        let key = QueryKey::new(Scope::Cursos);
        self.cached(&key, refresh, || self.client.fetch_cursos()).await
    }

    /// Subjects visible to the current role: teachers only see their own
    /// assignments, everyone else sees the catalog.
    async fn fetch_materias_por_rol(&self, refresh: bool) -> Result<Vec<Materia>> {
        let (user_id, role) = match self.session.data.as_ref() {
            Some(data) => (data.user_id, data.role),
            None => bail!("No hay sesión activa"),
        };
        match role {
            Role::Profesor => {
                let key = QueryKey::new(Scope::Materias).usuario(user_id);
                self.cached(&key, refresh, || self.client.fetch_materias(Some(user_id)))
                    .await
            }
            _ => {
                let key = QueryKey::new(Scope::Materias);
                self.cached(&key, refresh, || self.client.fetch_materias(None)).await
            }
        }
    }

    async fn fetch_estudiantes(&self, curso: Option<i64>, refresh: bool) -> Result<Vec<Usuario>> {
        let mut key = QueryKey::new(Scope::Estudiantes);
        if let Some(curso) = curso {
            key = key.curso(curso);
        }
        self.cached(&key, refresh, || self.client.fetch_estudiantes(curso)).await
    }

    async fn fetch_notas(&self, materia: i64, periodo: i64, refresh: bool) -> Result<Vec<Nota>> {
        let key = QueryKey::new(Scope::Notas).materia(materia).periodo(periodo);
        self.cached(&key, refresh, || self.client.fetch_notas(materia, periodo))
            .await
    }

    // ========================================================================
    // Dashboard
    // ========================================================================

    pub async fn dashboard(&self, refresh: bool) -> Result<String> {
        let (user_id, role) = self.require_view(View::Dashboard)?;

        match role {
            Role::Estudiante => {
                let key = QueryKey::new(Scope::DashboardEstudiante).usuario(user_id);
                let dashboard: EstudianteDashboard = self
                    .cached(&key, refresh, || self.client.fetch_estudiante_dashboard())
                    .await?;

                // Attendance/participation roll-ups are recomputed from the
                // raw events; a failed fetch degrades to empty sections.
                let asistencia_filters = AsistenciaFilters {
                    estudiante: Some(user_id),
                    ..Default::default()
                };
                let asistencias_key = QueryKey::new(Scope::Asistencias).usuario(user_id);
                let asistencias = self
                    .cached(&asistencias_key, refresh, || {
                        self.client.fetch_asistencias(&asistencia_filters)
                    })
                    .await
                    .unwrap_or_else(|err| {
                        warn!(error = %err, "Could not load attendance events");
                        Vec::new()
                    });

                let participacion_filters = ParticipacionFilters {
                    estudiante: Some(user_id),
                    ..Default::default()
                };
                let participaciones_key =
                    QueryKey::new(Scope::Participaciones).usuario(user_id);
                let participaciones = self
                    .cached(&participaciones_key, refresh, || {
                        self.client.fetch_participaciones(&participacion_filters)
                    })
                    .await
                    .unwrap_or_else(|err| {
                        warn!(error = %err, "Could not load participation events");
                        Vec::new()
                    });

                let nombre = self
                    .session
                    .data
                    .as_ref()
                    .map(|d| d.username.clone())
                    .unwrap_or_default();
                Ok(report::render_estudiante_dashboard(
                    &nombre,
                    &dashboard,
                    &summaries::attendance_by_materia(&asistencias),
                    &summaries::participation_by_materia(&participaciones),
                ))
            }
            Role::Administrativo | Role::Profesor => {
                let key = QueryKey::new(Scope::DashboardStats);
                let stats = self
                    .cached(&key, refresh, || self.client.fetch_dashboard_stats())
                    .await?;
                Ok(report::render_dashboard_stats(&stats))
            }
        }
    }

    // ========================================================================
    // Grade registry
    // ========================================================================

    pub async fn notas_list(
        &self,
        materia: Option<i64>,
        curso: Option<i64>,
        periodo: Option<i64>,
        refresh: bool,
    ) -> Result<String> {
        self.require_view(View::Notas)?;
        let materia = materia.ok_or(ValidationError::MissingFilter("materia"))?;
        let curso = curso.ok_or(ValidationError::MissingFilter("curso"))?;
        let periodo = periodo.ok_or(ValidationError::MissingFilter("periodo"))?;

        let materias = self.fetch_materias_por_rol(refresh).await?;
        let cursos = self.fetch_cursos(refresh).await?;
        let periodos = self.fetch_periodos(refresh).await?;
        let estudiantes = self.fetch_estudiantes(Some(curso), refresh).await?;
        let notas = self.fetch_notas(materia, periodo, refresh).await?;

        let curso_nombre = cursos
            .iter()
            .find(|c| c.id == curso)
            .map(|c| c.nombre.clone())
            .unwrap_or_else(|| "Curso no encontrado".to_string());
        let titulo = format!(
            "{} - {} - {}",
            nombre_materia(&materias, materia),
            curso_nombre,
            nombre_periodo(&periodos, periodo)
        );
        Ok(report::render_notas(&titulo, &estudiantes, &notas))
    }

    /// Register or update the grade record for one (estudiante, materia,
    /// periodo). The form input is clamped and validated first; the write
    /// then invalidates every aggregate that depended on the record.
    pub async fn nota_set(&self, input: NotaInput) -> Result<String> {
        self.require_view(View::Notas)?;
        let input = input.normalized()?;

        // Mutations work on fresh data; an existing record means update.
        let existentes = self.client.fetch_notas(input.materia, input.periodo).await?;
        let existente = existentes.iter().find(|n| n.estudiante == input.estudiante);

        let nota = match existente {
            Some(nota) => {
                debug!(id = nota.id, "Updating existing grade record");
                self.client.update_nota(nota.id, &input).await?
            }
            None => self.client.create_nota(&input).await?,
        };

        self.invalidate_notas(input.materia, input.periodo, input.estudiante)?;

        // The service derives the total too; a mismatch means one side is
        // out of contract.
        if let Ok(local) = nota.total_local() {
            if (local - nota.nota_total).abs() > 0.005 {
                warn!(
                    id = nota.id,
                    local,
                    servicio = nota.nota_total,
                    "Service total differs from local computation"
                );
            }
        }

        Ok(format!(
            "Calificación {} para estudiante {}: total {} ({})",
            if existente.is_some() {
                "actualizada"
            } else {
                "registrada"
            },
            input.estudiante,
            format_nota(nota.nota_total),
            crate::utils::format::estado_label(nota.aprobado)
        ))
    }

    /// Delete a grade record. Its filter dimensions are unknown from the
    /// id alone, so every grade-dependent scope is dropped.
    pub async fn nota_eliminar(&self, id: i64) -> Result<String> {
        self.require_view(View::Notas)?;
        self.client.delete_nota(id).await?;
        let removed = self.cache.invalidate_where(|key| {
            matches!(
                key.scope(),
                Scope::Notas
                    | Scope::NotasEstudiante
                    | Scope::DashboardStats
                    | Scope::DashboardEstudiante
            )
        })?;
        debug!(removed, "Grade delete invalidated dependent cache entries");
        Ok(format!("Calificación {} eliminada", id))
    }

    fn invalidate_notas(&self, materia: i64, periodo: i64, estudiante: i64) -> Result<()> {
        let removed = self.cache.invalidate_where(|key| match key.scope() {
            Scope::Notas => key.materia == Some(materia) && key.periodo == Some(periodo),
            Scope::NotasEstudiante => key.usuario == Some(estudiante),
            Scope::DashboardStats | Scope::DashboardEstudiante => true,
            _ => false,
        })?;
        debug!(removed, "Grade mutation invalidated dependent cache entries");
        Ok(())
    }

    // ========================================================================
    // Statistics and reports (client-side recompute)
    // ========================================================================

    async fn compute_estadisticas(
        &self,
        materia: Option<i64>,
        periodo: Option<i64>,
        refresh: bool,
    ) -> Result<EstadisticasMateria> {
        let materia = materia.ok_or(ValidationError::MissingFilter("materia"))?;
        let periodo = periodo.ok_or(ValidationError::MissingFilter("periodo"))?;

        let materias = self.fetch_materias_por_rol(refresh).await?;
        let periodos = self.fetch_periodos(refresh).await?;
        let estudiantes = self.fetch_estudiantes(None, refresh).await?;
        let notas = self.fetch_notas(materia, periodo, refresh).await?;

        Ok(grades::aggregate_subject(
            &nombre_materia(&materias, materia),
            &nombre_periodo(&periodos, periodo),
            &notas,
            |id| nombre_estudiante(&estudiantes, id),
        ))
    }

    pub async fn estadisticas(
        &self,
        materia: Option<i64>,
        periodo: Option<i64>,
        refresh: bool,
    ) -> Result<String> {
        self.require_view(View::Estadisticas)?;
        let stats = self.compute_estadisticas(materia, periodo, refresh).await?;
        Ok(report::render_estadisticas(&stats))
    }

    async fn compute_reporte(
        &self,
        curso: Option<i64>,
        periodo: Option<i64>,
        refresh: bool,
    ) -> Result<(String, ReporteTrimestral)> {
        let curso_id = curso.ok_or(ValidationError::MissingFilter("curso"))?;
        let periodo_id = periodo.ok_or(ValidationError::MissingFilter("periodo"))?;

        let cursos = self.fetch_cursos(refresh).await?;
        let Some(curso) = cursos.iter().find(|c| c.id == curso_id) else {
            bail!("Curso {} no encontrado", curso_id);
        };
        let periodos = self.fetch_periodos(refresh).await?;
        let Some(periodo) = periodos.iter().find(|p| p.id == periodo_id) else {
            bail!("Periodo {} no encontrado", periodo_id);
        };

        let materias = self.fetch_materias_por_rol(refresh).await?;
        let materias_curso: Vec<&Materia> = materias
            .iter()
            .filter(|m| curso.tiene_materia(m.id))
            .collect();
        let estudiantes = self.fetch_estudiantes(Some(curso_id), refresh).await?;

        // One grade fetch per subject, bounded fan-out.
        let notas_por_materia: HashMap<i64, Vec<Nota>> = stream::iter(&materias_curso)
            .map(|materia| async move {
                let notas = self.fetch_notas(materia.id, periodo_id, refresh).await;
                (materia.id, notas)
            })
            .buffer_unordered(MAX_CONCURRENT_REQUESTS)
            .filter_map(|(id, result)| async move {
                match result {
                    Ok(notas) => Some((id, notas)),
                    Err(err) => {
                        warn!(materia = id, error = %err, "Skipping subject with failed fetch");
                        None
                    }
                }
            })
            .collect()
            .await;

        let alumnos: Vec<grades::EstudianteMaterias<'_>> = estudiantes
            .iter()
            .map(|estudiante| grades::EstudianteMaterias {
                estudiante,
                notas: materias_curso
                    .iter()
                    .filter_map(|materia| {
                        notas_por_materia
                            .get(&materia.id)
                            .and_then(|notas| notas.iter().find(|n| n.estudiante == estudiante.id))
                            .map(|nota| (*materia, nota))
                    })
                    .collect(),
            })
            .collect();

        let reporte = grades::aggregate_course(periodo, &alumnos);
        Ok((curso.nombre.clone(), reporte))
    }

    pub async fn reporte(
        &self,
        curso: Option<i64>,
        periodo: Option<i64>,
        refresh: bool,
    ) -> Result<String> {
        self.require_view(View::Reportes)?;
        let (curso_nombre, reporte) = self.compute_reporte(curso, periodo, refresh).await?;
        Ok(report::render_reporte(&curso_nombre, &reporte))
    }

    // ========================================================================
    // Roster CRUD
    // ========================================================================

    pub async fn estudiantes_list(&self, curso: Option<i64>, refresh: bool) -> Result<String> {
        self.require_view(View::Estudiantes)?;
        let estudiantes = self.fetch_estudiantes(curso, refresh).await?;
        Ok(report::render_estudiantes(&estudiantes))
    }

    pub async fn estudiante_crear(
        &self,
        base: UsuarioBase,
        password: Option<String>,
    ) -> Result<String> {
        self.require_view(View::Estudiantes)?;
        let password = match password {
            Some(password) => password,
            None => rpassword::prompt_password("Contraseña del nuevo estudiante: ")
                .context("Failed to read password")?,
        };
        let input = UsuarioInput::Crear {
            base,
            password,
            role: Role::Estudiante,
        };
        let creado = self.client.create_usuario(&input).await?;
        self.invalidate_roster()?;
        Ok(format!(
            "Estudiante creado: {} (id {})",
            creado.full_name(),
            creado.id
        ))
    }

    pub async fn estudiante_editar(&self, id: i64, base: UsuarioBase) -> Result<String> {
        self.require_view(View::Estudiantes)?;
        let input = UsuarioInput::Editar { base };
        let editado = self.client.update_usuario(id, &input).await?;
        self.invalidate_roster()?;
        Ok(format!("Estudiante actualizado: {}", editado.full_name()))
    }

    pub async fn estudiante_eliminar(&self, id: i64) -> Result<String> {
        self.require_view(View::Estudiantes)?;
        self.client.delete_usuario(id).await?;
        self.invalidate_roster()?;
        Ok(format!("Estudiante {} eliminado", id))
    }

    fn invalidate_roster(&self) -> Result<()> {
        let removed = self.cache.invalidate_where(|key| {
            matches!(
                key.scope(),
                Scope::Estudiantes | Scope::DashboardStats | Scope::DashboardEstudiante
            )
        })?;
        debug!(removed, "Roster mutation invalidated dependent cache entries");
        Ok(())
    }

    // ========================================================================
    // Subject CRUD
    // ========================================================================

    pub async fn materias_list(&self, refresh: bool) -> Result<String> {
        self.require_view(View::Materias)?;
        let materias = self.fetch_materias_por_rol(refresh).await?;
        Ok(report::render_materias(&materias))
    }

    pub async fn materia_crear(&self, input: MateriaInput) -> Result<String> {
        self.require_view(View::Materias)?;
        let creada = self.client.create_materia(&input).await?;
        self.invalidate_materias()?;
        Ok(format!("Materia creada: {} (id {})", creada.display(), creada.id))
    }

    pub async fn materia_editar(&self, id: i64, input: MateriaInput) -> Result<String> {
        self.require_view(View::Materias)?;
        let editada = self.client.update_materia(id, &input).await?;
        self.invalidate_materias()?;
        Ok(format!("Materia actualizada: {}", editada.display()))
    }

    pub async fn materia_eliminar(&self, id: i64) -> Result<String> {
        self.require_view(View::Materias)?;
        self.client.delete_materia(id).await?;
        self.invalidate_materias()?;
        Ok(format!("Materia {} eliminada", id))
    }

    fn invalidate_materias(&self) -> Result<()> {
        let removed = self.cache.invalidate_where(|key| {
            matches!(
                key.scope(),
                Scope::Materias | Scope::Cursos | Scope::DashboardStats
            )
        })?;
        debug!(removed, "Subject mutation invalidated dependent cache entries");
        Ok(())
    }

    // ========================================================================
    // Courses
    // ========================================================================

    pub async fn cursos_list(&self, refresh: bool) -> Result<String> {
        self.require_view(View::Cursos)?;
        let cursos = self.fetch_cursos(refresh).await?;
        Ok(report::render_cursos(&cursos))
    }

    // ========================================================================
    // Yearly averages (client-side trimester roll-up)
    // ========================================================================

    /// Per-subject averages over the periods a student has grades in.
    /// A student sees their own; staff pass --estudiante.
    pub async fn promedios(&self, estudiante: Option<i64>, refresh: bool) -> Result<String> {
        let (user_id, role) = self.require_view(View::Dashboard)?;
        let estudiante = match role {
            Role::Estudiante => user_id,
            Role::Administrativo | Role::Profesor => {
                estudiante.ok_or(ValidationError::MissingFilter("estudiante"))?
            }
        };

        let key = QueryKey::new(Scope::NotasEstudiante).usuario(estudiante);
        let notas = self
            .cached(&key, refresh, || self.client.fetch_notas_estudiante(estudiante))
            .await?;

        let mut por_materia: std::collections::BTreeMap<
            i64,
            std::collections::BTreeMap<i64, Nota>,
        > = std::collections::BTreeMap::new();
        for nota in notas {
            por_materia
                .entry(nota.materia)
                .or_default()
                .insert(nota.periodo, nota);
        }
        let promedios = grades::aggregate_trimesters(&por_materia);

        let materias = self.fetch_materias_por_rol(refresh).await?;
        let nombre = match role {
            Role::Estudiante => self
                .session
                .data
                .as_ref()
                .map(|d| d.username.clone())
                .unwrap_or_default(),
            _ => {
                let estudiantes =
                    self.fetch_estudiantes(None, refresh).await.unwrap_or_default();
                nombre_estudiante(&estudiantes, estudiante)
            }
        };
        Ok(report::render_promedios(&nombre, &promedios, |id| {
            nombre_materia(&materias, id)
        }))
    }

    // ========================================================================
    // Attendance
    // ========================================================================

    pub async fn asistencias_list(
        &self,
        filters: AsistenciaFilters,
        refresh: bool,
    ) -> Result<String> {
        self.require_view(View::Asistencias)?;
        let key = asistencias_key(&filters);
        let eventos = self
            .cached(&key, refresh, || self.client.fetch_asistencias(&filters))
            .await?;
        let resumen = summaries::attendance_by_materia(&eventos);
        Ok(report::render_asistencias(&eventos, &resumen))
    }

    pub async fn asistencia_registrar(&self, input: AsistenciaInput) -> Result<String> {
        self.require_view(View::Asistencias)?;
        let registrada = self.client.create_asistencia(&input).await?;
        self.invalidate_asistencias(input.estudiante, input.materia, input.fecha)?;
        Ok(format!(
            "Asistencia registrada: estudiante {} en materia {} el {} ({})",
            registrada.estudiante,
            registrada.materia,
            registrada.fecha,
            registrada.estado.label()
        ))
    }

    pub async fn asistencia_editar(&self, id: i64, input: AsistenciaInput) -> Result<String> {
        self.require_view(View::Asistencias)?;
        let editada = self.client.update_asistencia(id, &input).await?;
        self.invalidate_asistencias(input.estudiante, input.materia, input.fecha)?;
        Ok(format!(
            "Asistencia {} actualizada: {} el {}",
            editada.id,
            editada.estado.label(),
            editada.fecha
        ))
    }

    pub async fn asistencia_eliminar(&self, id: i64) -> Result<String> {
        self.require_view(View::Asistencias)?;
        self.client.delete_asistencia(id).await?;
        // The deleted record's dimensions are unknown here; drop the scope.
        let removed = self.cache.invalidate_where(|key| {
            matches!(
                key.scope(),
                Scope::Asistencias | Scope::DashboardStats | Scope::DashboardEstudiante
            )
        })?;
        debug!(removed, "Attendance delete invalidated dependent cache entries");
        Ok(format!("Asistencia {} eliminada", id))
    }

    fn invalidate_asistencias(
        &self,
        estudiante: i64,
        materia: i64,
        fecha: NaiveDate,
    ) -> Result<()> {
        // An entry depends on the record unless one of its set dimensions
        // rules the record out.
        let removed = self.cache.invalidate_where(|key| match key.scope() {
            Scope::Asistencias => {
                (key.materia.is_none() || key.materia == Some(materia))
                    && (key.usuario.is_none() || key.usuario == Some(estudiante))
                    && (key.fecha.is_none() || key.fecha == Some(fecha))
            }
            Scope::DashboardStats | Scope::DashboardEstudiante => true,
            _ => false,
        })?;
        debug!(removed, "Attendance mutation invalidated dependent cache entries");
        Ok(())
    }

    // ========================================================================
    // Participation
    // ========================================================================

    pub async fn participaciones_list(
        &self,
        filters: ParticipacionFilters,
        refresh: bool,
    ) -> Result<String> {
        self.require_view(View::Participaciones)?;
        let key = participaciones_key(&filters);
        let eventos = self
            .cached(&key, refresh, || self.client.fetch_participaciones(&filters))
            .await?;
        let resumen = summaries::participation_by_materia(&eventos);
        Ok(report::render_participaciones(&eventos, &resumen))
    }

    pub async fn participacion_registrar(
        &self,
        input: crate::models::ParticipacionInput,
    ) -> Result<String> {
        self.require_view(View::Participaciones)?;
        if !input.valor_valido() {
            return Err(ValidationError::ComponentOutOfRange {
                componente: "valor",
                valor: input.valor as f64,
                maximo: 10.0,
            }
            .into());
        }
        let registrada = self.client.create_participacion(&input).await?;
        self.invalidate_participaciones(input.estudiante, input.materia, input.fecha)?;
        Ok(format!(
            "Participación registrada: {} (valor {}) para estudiante {}",
            registrada.tipo.label(),
            registrada.valor,
            registrada.estudiante
        ))
    }

    pub async fn participacion_editar(
        &self,
        id: i64,
        input: crate::models::ParticipacionInput,
    ) -> Result<String> {
        self.require_view(View::Participaciones)?;
        if !input.valor_valido() {
            return Err(ValidationError::ComponentOutOfRange {
                componente: "valor",
                valor: input.valor as f64,
                maximo: 10.0,
            }
            .into());
        }
        let editada = self.client.update_participacion(id, &input).await?;
        self.invalidate_participaciones(input.estudiante, input.materia, input.fecha)?;
        Ok(format!(
            "Participación {} actualizada: {} (valor {})",
            editada.id,
            editada.tipo.label(),
            editada.valor
        ))
    }

    pub async fn participacion_eliminar(&self, id: i64) -> Result<String> {
        self.require_view(View::Participaciones)?;
        self.client.delete_participacion(id).await?;
        // The deleted record's dimensions are unknown here; drop the scope.
        let removed = self.cache.invalidate_where(|key| {
            matches!(
                key.scope(),
                Scope::Participaciones | Scope::DashboardStats | Scope::DashboardEstudiante
            )
        })?;
        debug!(removed, "Participation delete invalidated dependent cache entries");
        Ok(format!("Participación {} eliminada", id))
    }

    fn invalidate_participaciones(
        &self,
        estudiante: i64,
        materia: i64,
        fecha: NaiveDate,
    ) -> Result<()> {
        let removed = self.cache.invalidate_where(|key| match key.scope() {
            Scope::Participaciones => {
                (key.materia.is_none() || key.materia == Some(materia))
                    && (key.usuario.is_none() || key.usuario == Some(estudiante))
                    && (key.fecha.is_none() || key.fecha == Some(fecha))
            }
            Scope::DashboardStats | Scope::DashboardEstudiante => true,
            _ => false,
        })?;
        debug!(removed, "Participation mutation invalidated dependent cache entries");
        Ok(())
    }

    // ========================================================================
    // CSV export
    // ========================================================================

    pub async fn exportar_notas(
        &self,
        materia: Option<i64>,
        periodo: Option<i64>,
        out: Option<PathBuf>,
        refresh: bool,
    ) -> Result<String> {
        self.require_view(View::Notas)?;
        let materia = materia.ok_or(ValidationError::MissingFilter("materia"))?;
        let periodo = periodo.ok_or(ValidationError::MissingFilter("periodo"))?;

        let notas = self.fetch_notas(materia, periodo, refresh).await?;
        if notas.is_empty() {
            bail!("No hay calificaciones disponibles para exportar");
        }
        let materias = self.fetch_materias_por_rol(refresh).await?;
        let periodos = self.fetch_periodos(refresh).await?;
        let estudiantes = self.fetch_estudiantes(None, refresh).await?;

        let materia_nombre = nombre_materia(&materias, materia);
        let periodo_nombre = nombre_periodo(&periodos, periodo);
        let rows = export::notas_rows(
            &notas,
            |id| nombre_estudiante(&estudiantes, id),
            &materia_nombre,
            &periodo_nombre,
        );

        let path = out.unwrap_or_else(|| {
            PathBuf::from(format!(
                "notas_{}_{}.csv",
                sanitize(&materia_nombre),
                sanitize(&periodo_nombre)
            ))
        });
        std::fs::write(&path, export::to_csv(&rows)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(format!("Notas exportadas a {}", path.display()))
    }

    pub async fn exportar_estadisticas(
        &self,
        materia: Option<i64>,
        periodo: Option<i64>,
        dir: Option<PathBuf>,
        refresh: bool,
    ) -> Result<String> {
        self.require_view(View::Estadisticas)?;
        let stats = self.compute_estadisticas(materia, periodo, refresh).await?;
        if stats.total_estudiantes == 0 {
            bail!("No hay estadísticas disponibles para exportar");
        }

        let dir = dir.unwrap_or_else(|| PathBuf::from("."));
        let tag = sanitize(&stats.materia_nombre);
        let files = [
            ("general", export::estadisticas_general_rows(&stats)),
            ("promedios", export::estadisticas_promedios_rows(&stats)),
            ("estudiantes", export::estadisticas_estudiantes_rows(&stats)),
        ];
        let mut written = Vec::new();
        for (suffix, rows) in files {
            let path = dir.join(format!("estadisticas_{}_{}.csv", suffix, tag));
            std::fs::write(&path, export::to_csv(&rows)?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written.push(path.display().to_string());
        }
        Ok(format!("Estadísticas exportadas: {}", written.join(", ")))
    }

    pub async fn exportar_reporte(
        &self,
        curso: Option<i64>,
        periodo: Option<i64>,
        dir: Option<PathBuf>,
        refresh: bool,
    ) -> Result<String> {
        self.require_view(View::Reportes)?;
        let (curso_nombre, reporte) = self.compute_reporte(curso, periodo, refresh).await?;
        if reporte.estudiantes.is_empty() {
            bail!("No hay reporte disponible para exportar");
        }

        let dir = dir.unwrap_or_else(|| PathBuf::from("."));
        let tag = sanitize(&curso_nombre);
        let resumen_path = dir.join(format!("reporte_resumen_{}.csv", tag));
        std::fs::write(
            &resumen_path,
            export::to_csv(&export::reporte_resumen_rows(&curso_nombre, &reporte))?,
        )
        .with_context(|| format!("Failed to write {}", resumen_path.display()))?;

        let detalle_path = dir.join(format!("reporte_detallado_{}.csv", tag));
        std::fs::write(
            &detalle_path,
            export::to_csv(&export::reporte_detallado_rows(&reporte))?,
        )
        .with_context(|| format!("Failed to write {}", detalle_path.display()))?;

        Ok(format!(
            "Reporte exportado: {}, {}",
            resumen_path.display(),
            detalle_path.display()
        ))
    }

    // ========================================================================
    // Cache maintenance
    // ========================================================================

    pub fn cache_status(&self) -> Result<String> {
        let entries = self.cache.ages()?;
        Ok(report::render_cache_status(&entries))
    }

    pub fn cache_clear(&self) -> Result<String> {
        let removed = self.cache.clear()?;
        Ok(format!("Cache limpiado: {} entradas eliminadas", removed))
    }
}

fn asistencias_key(filters: &AsistenciaFilters) -> QueryKey {
    let mut key = QueryKey::new(Scope::Asistencias);
    if let Some(id) = filters.estudiante {
        key = key.usuario(id);
    }
    if let Some(id) = filters.materia {
        key = key.materia(id);
    }
    if let Some(id) = filters.curso {
        key = key.curso(id);
    }
    if let Some(fecha) = filters.fecha {
        key = key.fecha(fecha);
    }
    key
}

fn participaciones_key(filters: &ParticipacionFilters) -> QueryKey {
    let mut key = QueryKey::new(Scope::Participaciones);
    if let Some(id) = filters.estudiante {
        key = key.usuario(id);
    }
    if let Some(id) = filters.materia {
        key = key.materia(id);
    }
    if let Some(id) = filters.curso {
        key = key.curso(id);
    }
    if let Some(fecha) = filters.fecha {
        key = key.fecha(fecha);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nombre_lookups_fall_back_to_sentinels() {
        let estudiantes = vec![Usuario {
            id: 1,
            username: "ana".to_string(),
            email: None,
            first_name: "Ana".to_string(),
            last_name: "Quispe".to_string(),
            curso: None,
            curso_nombre: None,
            is_active: true,
            role: Role::Estudiante,
        }];
        assert_eq!(nombre_estudiante(&estudiantes, 1), "Ana Quispe");
        assert_eq!(nombre_estudiante(&estudiantes, 99), ESTUDIANTE_NO_ENCONTRADO);
        assert_eq!(nombre_materia(&[], 1), MATERIA_NO_ENCONTRADA);
        assert_eq!(nombre_periodo(&[], 1), PERIODO_NO_ENCONTRADO);
    }

    #[test]
    fn test_sanitize_for_file_names() {
        assert_eq!(sanitize("4to A"), "4to_A");
        assert_eq!(sanitize("Física"), "Física");
    }

    #[test]
    fn test_filters_map_to_canonical_keys() {
        let filters = AsistenciaFilters {
            estudiante: Some(9),
            materia: Some(4),
            curso: None,
            fecha: NaiveDate::from_ymd_opt(2025, 6, 2),
        };
        assert_eq!(
            asistencias_key(&filters).file_name(),
            "asistencias_u9_m4_f2025-06-02.json"
        );

        let filters = ParticipacionFilters::default();
        assert_eq!(
            participaciones_key(&filters).file_name(),
            "participaciones.json"
        );
    }
}
