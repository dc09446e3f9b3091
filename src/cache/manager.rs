use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

/// Consider cache stale after 1 hour.
/// Balances freshness with reducing unnecessary API calls for slowly-changing data.
const CACHE_STALE_MINUTES: i64 = 60;

// ============================================================================
// Query keys
// ============================================================================

/// The kind of data a cache entry holds. One scope per read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Estudiantes,
    Materias,
    Cursos,
    Periodos,
    Notas,
    NotasEstudiante,
    Asistencias,
    Participaciones,
    DashboardStats,
    DashboardEstudiante,
}

impl Scope {
    fn as_str(&self) -> &'static str {
        match self {
            Scope::Estudiantes => "estudiantes",
            Scope::Materias => "materias",
            Scope::Cursos => "cursos",
            Scope::Periodos => "periodos",
            Scope::Notas => "notas",
            Scope::NotasEstudiante => "notas-estudiante",
            Scope::Asistencias => "asistencias",
            Scope::Participaciones => "participaciones",
            Scope::DashboardStats => "dashboard-stats",
            Scope::DashboardEstudiante => "dashboard-estudiante",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "estudiantes" => Some(Scope::Estudiantes),
            "materias" => Some(Scope::Materias),
            "cursos" => Some(Scope::Cursos),
            "periodos" => Some(Scope::Periodos),
            "notas" => Some(Scope::Notas),
            "notas-estudiante" => Some(Scope::NotasEstudiante),
            "asistencias" => Some(Scope::Asistencias),
            "participaciones" => Some(Scope::Participaciones),
            "dashboard-stats" => Some(Scope::DashboardStats),
            "dashboard-estudiante" => Some(Scope::DashboardEstudiante),
            _ => None,
        }
    }
}

/// Canonical cache key: a scope plus the typed filter dimensions the read
/// was issued with. Two reads with the same filters share an entry, and
/// invalidation matches on these dimensions rather than on file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryKey {
    scope: Scope,
    pub usuario: Option<i64>,
    pub materia: Option<i64>,
    pub periodo: Option<i64>,
    pub curso: Option<i64>,
    pub fecha: Option<NaiveDate>,
}

impl QueryKey {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            usuario: None,
            materia: None,
            periodo: None,
            curso: None,
            fecha: None,
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn usuario(mut self, id: i64) -> Self {
        self.usuario = Some(id);
        self
    }

    pub fn materia(mut self, id: i64) -> Self {
        self.materia = Some(id);
        self
    }

    pub fn periodo(mut self, id: i64) -> Self {
        self.periodo = Some(id);
        self
    }

    pub fn curso(mut self, id: i64) -> Self {
        self.curso = Some(id);
        self
    }

    pub fn fecha(mut self, fecha: NaiveDate) -> Self {
        self.fecha = Some(fecha);
        self
    }

    /// Deterministic file name: scope first, then the set dimensions in a
    /// fixed order, so the same filters always canonicalize identically.
    pub fn file_name(&self) -> String {
        let mut name = self.scope().as_str().to_string();
        if let Some(id) = self.usuario {
            name.push_str(&format!("_u{}", id));
        }
        if let Some(id) = self.materia {
            name.push_str(&format!("_m{}", id));
        }
        if let Some(id) = self.periodo {
            name.push_str(&format!("_p{}", id));
        }
        if let Some(id) = self.curso {
            name.push_str(&format!("_c{}", id));
        }
        if let Some(fecha) = self.fecha {
            name.push_str(&format!("_f{}", fecha));
        }
        name.push_str(".json");
        name
    }

    /// Parse a cache file name back into its key. Returns None for files
    /// that are not cache entries (e.g. the session file).
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".json")?;
        let mut parts = stem.split('_');
        let scope = Scope::from_str(parts.next()?)?;
        let mut key = QueryKey::new(scope);
        for part in parts {
            if part.len() < 2 {
                return None;
            }
            let (tag, value) = part.split_at(1);
            match tag {
                "u" => key.usuario = Some(value.parse().ok()?),
                "m" => key.materia = Some(value.parse().ok()?),
                "p" => key.periodo = Some(value.parse().ok()?),
                "c" => key.curso = Some(value.parse().ok()?),
                "f" => key.fecha = Some(value.parse().ok()?),
                _ => return None,
            }
        }
        Some(key)
    }
}

// ============================================================================
// Cached payloads
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew gracefully
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            let remaining_mins = minutes % 60;
            if remaining_mins >= 30 {
                // Round up: 1h 30m+ becomes 2h
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            let remaining_hours = (minutes % 1440) / 60;
            if remaining_hours >= 12 {
                // Round up: 1d 12h+ becomes 2d
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > CACHE_STALE_MINUTES
    }
}

// ============================================================================
// Manager
// ============================================================================

pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, key: &QueryKey) -> PathBuf {
        self.cache_dir.join(key.file_name())
    }

    pub fn load<T: DeserializeOwned>(&self, key: &QueryKey) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", key.file_name()))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", key.file_name()))?;

        Ok(Some(cached))
    }

    pub fn save<T: Serialize>(&self, key: &QueryKey, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let path = self.cache_path(key);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(&path, contents)?;
        debug!(key = %key.file_name(), "Cache entry written");
        Ok(())
    }

    /// Drop every entry whose key matches the predicate. This is how
    /// mutations invalidate: the caller describes the dependent reads by
    /// their filter dimensions and everything matching is refetched on the
    /// next read.
    pub fn invalidate_where(&self, pred: impl Fn(&QueryKey) -> bool) -> Result<usize> {
        let mut removed = 0;
        for (key, path) in self.entries()? {
            if pred(&key) {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove cache file: {:?}", path))?;
                debug!(key = %key.file_name(), "Cache entry invalidated");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Drop everything.
    pub fn clear(&self) -> Result<usize> {
        self.invalidate_where(|_| true)
    }

    /// All parseable cache entries with their paths.
    fn entries(&self) -> Result<Vec<(QueryKey, PathBuf)>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            // Non-cache files (session.json among them) simply don't parse.
            if let Some(key) = QueryKey::parse(name) {
                out.push((key, entry.path()));
            }
        }
        Ok(out)
    }

    /// Age display per entry, for `cache status`.
    pub fn ages(&self) -> Result<Vec<(QueryKey, String)>> {
        #[derive(Deserialize)]
        struct Envelope {
            cached_at: DateTime<Utc>,
        }

        let mut out = Vec::new();
        for (key, path) in self.entries()? {
            let contents = std::fs::read_to_string(&path)?;
            if let Ok(envelope) = serde_json::from_str::<Envelope>(&contents) {
                let cached = CachedData {
                    data: (),
                    cached_at: envelope.cached_at,
                };
                out.push((key, cached.age_display()));
            }
        }
        out.sort_by_key(|(key, _)| key.file_name());
        Ok(out)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn temp_manager(tag: &str) -> (CacheManager, PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "aulacache-test-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        (CacheManager::new(dir.clone()).unwrap(), dir)
    }

    #[test]
    fn test_query_key_canonical_file_name() {
        let key = QueryKey::new(Scope::Notas).periodo(2).materia(5);
        // Dimension order is fixed regardless of builder order.
        assert_eq!(key.file_name(), "notas_m5_p2.json");

        let key = QueryKey::new(Scope::Participaciones)
            .materia(4)
            .curso(1)
            .fecha(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        assert_eq!(key.file_name(), "participaciones_m4_c1_f2025-06-02.json");
    }

    #[test]
    fn test_query_key_parse_round_trip() {
        let keys = [
            QueryKey::new(Scope::Cursos),
            QueryKey::new(Scope::Notas).materia(5).periodo(2),
            QueryKey::new(Scope::NotasEstudiante).usuario(9),
            QueryKey::new(Scope::Asistencias)
                .curso(3)
                .fecha(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()),
        ];
        for key in keys {
            assert_eq!(QueryKey::parse(&key.file_name()), Some(key));
        }
    }

    #[test]
    fn test_query_key_parse_rejects_foreign_files() {
        assert_eq!(QueryKey::parse("session.json"), None);
        assert_eq!(QueryKey::parse("notas_m5_p2.tmp"), None);
        assert_eq!(QueryKey::parse("notas_x9.json"), None);
    }

    #[test]
    fn test_cached_data_is_stale() {
        let fresh = CachedData::new(vec![1]);
        assert!(!fresh.is_stale());
        assert_eq!(fresh.age_display(), "just now");

        let mut old = CachedData::new(vec![1]);
        old.cached_at = Utc::now() - Duration::minutes(61);
        assert!(old.is_stale());
    }

    #[test]
    fn test_save_load_and_targeted_invalidation() {
        let (manager, dir) = temp_manager("invalidate");

        let notas_m5 = QueryKey::new(Scope::Notas).materia(5).periodo(2);
        let notas_m6 = QueryKey::new(Scope::Notas).materia(6).periodo(2);
        let cursos = QueryKey::new(Scope::Cursos);
        manager.save(&notas_m5, &vec![1, 2, 3]).unwrap();
        manager.save(&notas_m6, &vec![4]).unwrap();
        manager.save(&cursos, &vec![9]).unwrap();

        let loaded: CachedData<Vec<i32>> = manager.load(&notas_m5).unwrap().unwrap();
        assert_eq!(loaded.data, vec![1, 2, 3]);

        // A grade mutation in materia 5 drops only the dependent reads.
        let removed = manager
            .invalidate_where(|k| k.scope() == Scope::Notas && k.materia == Some(5))
            .unwrap();
        assert_eq!(removed, 1);
        assert!(manager.load::<Vec<i32>>(&notas_m5).unwrap().is_none());
        assert!(manager.load::<Vec<i32>>(&notas_m6).unwrap().is_some());
        assert!(manager.load::<Vec<i32>>(&cursos).unwrap().is_some());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_clear_removes_only_cache_entries() {
        let (manager, dir) = temp_manager("clear");

        manager
            .save(&QueryKey::new(Scope::Materias), &vec!["algebra"])
            .unwrap();
        std::fs::write(dir.join("session.json"), "{}").unwrap();

        let removed = manager.clear().unwrap();
        assert_eq!(removed, 1);
        assert!(dir.join("session.json").exists());

        let _ = std::fs::remove_dir_all(dir);
    }
}
