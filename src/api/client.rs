//! API client for the school-management REST service.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! requests to fetch and mutate students, subjects, courses, grade
//! records, attendance, and participation data.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::SessionData;
use crate::models::{
    Asistencia, AsistenciaInput, Curso, DashboardStats, EstudianteDashboard, Materia,
    MateriaInput, Nota, NotaInput, Participacion, ParticipacionInput, Periodo, Role, Usuario,
    UsuarioInput,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Extra attempts for a failed read before giving up.
/// Two retries with a fixed delay; mutations are never retried.
const READ_RETRY_ATTEMPTS: u32 = 2;

/// Fixed delay between read retries in milliseconds.
const READ_RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: i64,
    username: String,
    role: Role,
}

/// Optional filters for attendance queries. Every set field becomes a
/// query parameter; the combination is also the cache key for the read.
#[derive(Debug, Clone, Default)]
pub struct AsistenciaFilters {
    pub estudiante: Option<i64>,
    pub materia: Option<i64>,
    pub curso: Option<i64>,
    pub fecha: Option<NaiveDate>,
}

/// Optional filters for participation queries.
#[derive(Debug, Clone, Default)]
pub struct ParticipacionFilters {
    pub estudiante: Option<i64>,
    pub materia: Option<i64>,
    pub curso: Option<i64>,
    pub fecha: Option<NaiveDate>,
}

fn push_param(params: &mut Vec<(&'static str, String)>, name: &'static str, value: Option<String>) {
    if let Some(value) = value {
        params.push((name, value));
    }
}

impl AsistenciaFilters {
    fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        push_param(&mut params, "estudiante", self.estudiante.map(|id| id.to_string()));
        push_param(&mut params, "materia", self.materia.map(|id| id.to_string()));
        push_param(&mut params, "curso", self.curso.map(|id| id.to_string()));
        push_param(&mut params, "fecha", self.fecha.map(|f| f.to_string()));
        params
    }
}

impl ParticipacionFilters {
    fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        push_param(&mut params, "estudiante", self.estudiante.map(|id| id.to_string()));
        push_param(&mut params, "materia", self.materia.map(|id| id.to_string()));
        push_param(&mut params, "curso", self.curso.map(|id| id.to_string()));
        push_param(&mut params, "fecha", self.fecha.map(|f| f.to_string()));
        params
    }
}

/// API client for the school-management service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client against the given service base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(), // Cheap clone, shares connection pool
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Authenticate and return session data for the logged-in account.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionData> {
        let url = self.url("/auth/login/");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .context("Failed to send authentication request")?;

        let response = Self::check_response(response).await?;
        let auth: AuthResponse = response
            .json()
            .await
            .context("Failed to parse auth response")?;

        Ok(SessionData {
            token: auth.token,
            user_id: auth.user.id,
            username: auth.user.username,
            role: auth.user.role,
            created_at: Utc::now(),
        })
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Check if response is successful, returning a typed error with the
    /// body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// GET with the bounded read retry: up to two extra attempts with a
    /// fixed delay for retryable failures. Non-retryable errors (auth,
    /// validation, not-found) surface immediately.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T> {
        let url = self.url(path);
        let mut attempt = 0u32;

        loop {
            let result = self.get_once(&url, query).await;
            match result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let retryable = err
                        .downcast_ref::<ApiError>()
                        .map(ApiError::is_retryable)
                        .unwrap_or(false);
                    if !retryable || attempt >= READ_RETRY_ATTEMPTS {
                        return Err(err);
                    }
                    attempt += 1;
                    warn!(url = %url, attempt, "Read failed, retrying after fixed delay");
                    tokio::time::sleep(Duration::from_millis(READ_RETRY_DELAY_MS)).await;
                }
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&'static str, String)],
    ) -> Result<T> {
        let response = self
            .client
            .get(url)
            .query(query)
            .headers(self.auth_headers()?)
            .send()
            .await
            .map_err(ApiError::NetworkError)
            .with_context(|| format!("Failed to send GET request to {}", url))?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    /// GET a list endpoint, tolerating both a bare array and the paginated
    /// `{"results": [...]}` wrapper.
    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<Vec<T>> {
        let value: serde_json::Value = self.get(path, query).await?;
        Self::parse_list(value, path)
    }

    fn parse_list<T: DeserializeOwned>(value: serde_json::Value, path: &str) -> Result<Vec<T>> {
        #[derive(Deserialize)]
        struct Paginated<T> {
            results: Vec<T>,
        }

        if value.is_array() {
            return serde_json::from_value(value)
                .with_context(|| format!("Failed to parse list response from {}", path));
        }
        let paginated: Paginated<T> = serde_json::from_value(value)
            .with_context(|| format!("Failed to parse paginated response from {}", path))?;
        debug!(path = path, count = paginated.results.len(), "Parsed paginated response");
        Ok(paginated.results)
    }

    /// POST a mutation. Never retried: the service applies last-write-wins
    /// and a blind replay could double-apply a create.
    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send POST request to {}", url))?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    /// PUT a mutation. Never retried.
    async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        let response = self
            .client
            .put(&url)
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send PUT request to {}", url))?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    /// DELETE a resource. Never retried.
    async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        let response = self
            .client
            .delete(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .with_context(|| format!("Failed to send DELETE request to {}", url))?;

        Self::check_response(response).await?;
        Ok(())
    }

    // ===== Usuarios =====

    /// Fetch user accounts, optionally filtered by role and course.
    pub async fn fetch_usuarios(
        &self,
        rol: Option<Role>,
        curso: Option<i64>,
    ) -> Result<Vec<Usuario>> {
        let mut params = Vec::new();
        if let Some(rol) = rol {
            let value = serde_json::to_value(rol)?;
            push_param(&mut params, "role", value.as_str().map(|s| s.to_string()));
        }
        push_param(&mut params, "curso", curso.map(|id| id.to_string()));
        self.get_list("/usuarios/", &params).await
    }

    /// Fetch the student roster, optionally restricted to one course.
    pub async fn fetch_estudiantes(&self, curso: Option<i64>) -> Result<Vec<Usuario>> {
        self.fetch_usuarios(Some(Role::Estudiante), curso).await
    }

    pub async fn create_usuario(&self, input: &UsuarioInput) -> Result<Usuario> {
        self.post("/usuarios/", &input.to_body()).await
    }

    pub async fn update_usuario(&self, id: i64, input: &UsuarioInput) -> Result<Usuario> {
        self.put(&format!("/usuarios/{}/", id), &input.to_body()).await
    }

    pub async fn delete_usuario(&self, id: i64) -> Result<()> {
        self.delete(&format!("/usuarios/{}/", id)).await
    }

    // ===== Materias =====

    /// Fetch subjects. A teacher only sees the subjects assigned to them;
    /// the service filters by the `profesor` parameter.
    pub async fn fetch_materias(&self, profesor: Option<i64>) -> Result<Vec<Materia>> {
        let mut params = Vec::new();
        push_param(&mut params, "profesor", profesor.map(|id| id.to_string()));
        self.get_list("/materias/", &params).await
    }

    pub async fn create_materia(&self, input: &MateriaInput) -> Result<Materia> {
        self.post("/materias/", input).await
    }

    pub async fn update_materia(&self, id: i64, input: &MateriaInput) -> Result<Materia> {
        self.put(&format!("/materias/{}/", id), input).await
    }

    pub async fn delete_materia(&self, id: i64) -> Result<()> {
        self.delete(&format!("/materias/{}/", id)).await
    }

    // ===== Cursos / Periodos =====

    pub async fn fetch_cursos(&self) -> Result<Vec<Curso>> {
        self.get_list("/cursos/", &[]).await
    }

    pub async fn fetch_periodos(&self) -> Result<Vec<Periodo>> {
        self.get_list("/periodos/", &[]).await
    }

    // ===== Notas =====

    /// Fetch the grade records for one (materia, periodo).
    pub async fn fetch_notas(&self, materia: i64, periodo: i64) -> Result<Vec<Nota>> {
        let params = vec![
            ("materia", materia.to_string()),
            ("periodo", periodo.to_string()),
        ];
        self.get_list("/notas/", &params).await
    }

    /// Fetch every grade record of one student across periods, for the
    /// yearly roll-up.
    pub async fn fetch_notas_estudiante(&self, estudiante: i64) -> Result<Vec<Nota>> {
        let params = vec![("estudiante", estudiante.to_string())];
        self.get_list("/notas/", &params).await
    }

    pub async fn create_nota(&self, input: &NotaInput) -> Result<Nota> {
        self.post("/notas/", input).await
    }

    pub async fn update_nota(&self, id: i64, input: &NotaInput) -> Result<Nota> {
        self.put(&format!("/notas/{}/", id), input).await
    }

    pub async fn delete_nota(&self, id: i64) -> Result<()> {
        self.delete(&format!("/notas/{}/", id)).await
    }

    // ===== Asistencias =====

    pub async fn fetch_asistencias(&self, filters: &AsistenciaFilters) -> Result<Vec<Asistencia>> {
        self.get_list("/asistencias/", &filters.to_query()).await
    }

    pub async fn create_asistencia(&self, input: &AsistenciaInput) -> Result<Asistencia> {
        self.post("/asistencias/", input).await
    }

    pub async fn update_asistencia(&self, id: i64, input: &AsistenciaInput) -> Result<Asistencia> {
        self.put(&format!("/asistencias/{}/", id), input).await
    }

    pub async fn delete_asistencia(&self, id: i64) -> Result<()> {
        self.delete(&format!("/asistencias/{}/", id)).await
    }

    // ===== Participaciones =====

    pub async fn fetch_participaciones(
        &self,
        filters: &ParticipacionFilters,
    ) -> Result<Vec<Participacion>> {
        self.get_list("/participaciones/", &filters.to_query()).await
    }

    pub async fn create_participacion(&self, input: &ParticipacionInput) -> Result<Participacion> {
        self.post("/participaciones/", input).await
    }

    pub async fn update_participacion(
        &self,
        id: i64,
        input: &ParticipacionInput,
    ) -> Result<Participacion> {
        self.put(&format!("/participaciones/{}/", id), input).await
    }

    pub async fn delete_participacion(&self, id: i64) -> Result<()> {
        self.delete(&format!("/participaciones/{}/", id)).await
    }

    // ===== Dashboards (precomputed by the service, re-rendered) =====

    /// Global dashboard for administrative and teaching staff.
    pub async fn fetch_dashboard_stats(&self) -> Result<DashboardStats> {
        self.get("/dashboard/estadisticas/", &[]).await
    }

    /// The authenticated student's own dashboard.
    pub async fn fetch_estudiante_dashboard(&self) -> Result<EstudianteDashboard> {
        self.get("/dashboard/estudiante/", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_accepts_bare_array() {
        let value = serde_json::json!([
            {"id": 1, "nombre": "4to A", "materias": [2, 3]},
            {"id": 2, "nombre": "5to A", "materias": []}
        ]);
        let cursos: Vec<Curso> = ApiClient::parse_list(value, "/cursos/").unwrap();
        assert_eq!(cursos.len(), 2);
        assert!(cursos[0].tiene_materia(3));
    }

    #[test]
    fn test_parse_list_accepts_paginated_wrapper() {
        let value = serde_json::json!({
            "count": 1,
            "next": null,
            "previous": null,
            "results": [{
                "id": 11, "estudiante": 3, "materia": 5, "periodo": 2,
                "ser_puntaje": 8.0, "decidir_puntaje": 9.0,
                "hacer_puntaje": 30.0, "saber_puntaje": 28.0,
                "autoevaluacion_ser": 4.0, "autoevaluacion_decidir": 3.0,
                "nota_total": 82.0, "aprobado": true
            }]
        });
        let notas: Vec<Nota> = ApiClient::parse_list(value, "/notas/").unwrap();
        assert_eq!(notas.len(), 1);
        assert_eq!(notas[0].nota_total, 82.0);
    }

    #[test]
    fn test_filters_to_query_skips_unset_dimensions() {
        let filters = AsistenciaFilters {
            materia: Some(4),
            fecha: NaiveDate::from_ymd_opt(2025, 6, 2),
            ..Default::default()
        };
        let query = filters.to_query();
        assert_eq!(
            query,
            vec![("materia", "4".to_string()), ("fecha", "2025-06-02".to_string())]
        );
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("https://colegio.example.org/api/").unwrap();
        assert_eq!(client.url("/notas/"), "https://colegio.example.org/api/notas/");
    }
}
