// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// Account role as reported by the service.
///
/// Every role-dependent decision in the client goes through this enum:
/// navigation sets, command gating, and query enablement all match on it
/// rather than comparing raw strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ADMINISTRATIVO")]
    Administrativo,
    #[serde(rename = "PROFESOR")]
    Profesor,
    #[serde(rename = "ESTUDIANTE")]
    Estudiante,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Administrativo => write!(f, "Administrativo"),
            Role::Profesor => write!(f, "Profesor"),
            Role::Estudiante => write!(f, "Estudiante"),
        }
    }
}

/// Views the client can render, one per top-level section of the
/// system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Estudiantes,
    Materias,
    Cursos,
    Asistencias,
    Participaciones,
    Notas,
    Estadisticas,
    Reportes,
}

impl View {
    pub fn title(&self) -> &'static str {
        match self {
            View::Dashboard => "Dashboard",
            View::Estudiantes => "Estudiantes",
            View::Materias => "Materias",
            View::Cursos => "Cursos",
            View::Asistencias => "Asistencias",
            View::Participaciones => "Participaciones",
            View::Notas => "Registro de Notas",
            View::Estadisticas => "Estadísticas de Materia",
            View::Reportes => "Reportes Trimestrales",
        }
    }
}

impl Role {
    /// The set of views this role may open. One arm per role; callers must
    /// not re-derive access from the role name.
    pub fn views(&self) -> &'static [View] {
        match self {
            Role::Administrativo => &[
                View::Dashboard,
                View::Estudiantes,
                View::Materias,
                View::Cursos,
                View::Asistencias,
                View::Participaciones,
                View::Notas,
                View::Estadisticas,
                View::Reportes,
            ],
            Role::Profesor => &[
                View::Dashboard,
                View::Notas,
                View::Asistencias,
                View::Participaciones,
            ],
            Role::Estudiante => &[View::Dashboard],
        }
    }

    pub fn can_access(&self, view: View) -> bool {
        self.views().contains(&view)
    }
}

/// A user account: students, teachers, and administrative staff share
/// one shape on the wire, discriminated by `role`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usuario {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub curso: Option<i64>,
    #[serde(default)]
    pub curso_nombre: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub role: Role,
}

fn default_true() -> bool {
    true
}

impl Usuario {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }

    pub fn is_estudiante(&self) -> bool {
        self.role == Role::Estudiante
    }
}

/// Shared fields of the student create/edit forms.
#[derive(Debug, Clone, Serialize)]
pub struct UsuarioBase {
    pub username: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub curso: Option<i64>,
    pub is_active: bool,
}

/// Form payload for user mutations. The password exists only on create;
/// edits never carry one, so the two modes are distinct variants instead
/// of an optional field.
#[derive(Debug, Clone)]
pub enum UsuarioInput {
    Crear {
        base: UsuarioBase,
        password: String,
        role: Role,
    },
    Editar {
        base: UsuarioBase,
    },
}

impl UsuarioInput {
    pub fn base(&self) -> &UsuarioBase {
        match self {
            UsuarioInput::Crear { base, .. } => base,
            UsuarioInput::Editar { base } => base,
        }
    }

    /// Request body for the service. Create includes password and role;
    /// edit sends only the shared fields.
    pub fn to_body(&self) -> serde_json::Value {
        let mut body = match serde_json::to_value(self.base()) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        if let UsuarioInput::Crear { password, role, .. } = self {
            body.insert("password".into(), serde_json::Value::String(password.clone()));
            body.insert(
                "role".into(),
                serde_json::to_value(role).unwrap_or(serde_json::Value::Null),
            );
        }
        serde_json::Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_views_are_nested_by_privilege() {
        // Every view a teacher has, an administrator has too.
        for view in Role::Profesor.views() {
            assert!(Role::Administrativo.can_access(*view));
        }
        // Students only see their own dashboard.
        assert_eq!(Role::Estudiante.views(), &[View::Dashboard]);
        assert!(!Role::Estudiante.can_access(View::Notas));
        assert!(!Role::Profesor.can_access(View::Estudiantes));
        assert!(Role::Profesor.can_access(View::Notas));
    }

    #[test]
    fn test_role_wire_values() {
        let role: Role = serde_json::from_str("\"PROFESOR\"").unwrap();
        assert_eq!(role, Role::Profesor);
        assert_eq!(serde_json::to_string(&Role::Estudiante).unwrap(), "\"ESTUDIANTE\"");
    }

    #[test]
    fn test_usuario_input_bodies() {
        let base = UsuarioBase {
            username: "mquispe".to_string(),
            email: Some("mquispe@colegio.edu.bo".to_string()),
            first_name: "María".to_string(),
            last_name: "Quispe".to_string(),
            curso: Some(4),
            is_active: true,
        };

        let crear = UsuarioInput::Crear {
            base: base.clone(),
            password: "s3creta".to_string(),
            role: Role::Estudiante,
        };
        let body = crear.to_body();
        assert_eq!(body["password"], "s3creta");
        assert_eq!(body["role"], "ESTUDIANTE");
        assert_eq!(body["username"], "mquispe");

        let editar = UsuarioInput::Editar { base };
        let body = editar.to_body();
        assert!(body.get("password").is_none());
        assert_eq!(body["curso"], 4);
    }
}
