use crate::error::PersonaError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use vigil_core::PersonaId;

const DEFAULT_LOCALE: &str = "en-US";

/// Browser viewport dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

/// Accessibility emulation applied to every page of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessibilityMode {
    /// Doubles the page zoom
    LowVision,
}

impl AccessibilityMode {
    /// Script injected before any page script runs.
    pub fn init_script(self) -> &'static str {
        match self {
            Self::LowVision => {
                "document.addEventListener('DOMContentLoaded', () => { document.body.style.zoom = '2'; });"
            }
        }
    }
}

/// Upstream proxy, either a bare URL or `{ "server": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProxySpec {
    Url(String),
    Config { server: String },
}

impl ProxySpec {
    pub fn server(&self) -> &str {
        match self {
            Self::Url(server) | Self::Config { server } => server,
        }
    }
}

/// Named browsing-profile configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub viewport: Option<Viewport>,
    #[serde(default)]
    pub proxy: Option<ProxySpec>,
    #[serde(default)]
    pub accessibility: Option<AccessibilityMode>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Persona {
    /// Locale derived from the persona's `Accept-Language` header.
    pub fn locale(&self) -> String {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("accept-language"))
            .and_then(|(_, value)| value.split(|c: char| c == ',' || c == ';').next())
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .unwrap_or(DEFAULT_LOCALE)
            .to_string()
    }

    /// Session parameters for a page browsed under this persona.
    pub fn session_params(&self, default_user_agent: &str) -> SessionParams {
        SessionParams {
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| default_user_agent.to_string()),
            locale: self.locale(),
            viewport: self.viewport.unwrap_or_default(),
            extra_headers: self.headers.clone(),
            proxy: self.proxy.as_ref().map(|p| p.server().to_string()),
            accessibility: self.accessibility,
        }
    }
}

/// Everything a browsing context and its pages need to emulate a persona.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub user_agent: String,
    pub locale: String,
    pub viewport: Viewport,
    pub extra_headers: BTreeMap<String, String>,
    pub proxy: Option<String>,
    pub accessibility: Option<AccessibilityMode>,
}

/// Read-only registry of personas, keyed by ID.
#[derive(Debug, Clone, Default)]
pub struct PersonaRegistry {
    personas: HashMap<PersonaId, Persona>,
}

impl PersonaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry from a JSON object of `{ "<id>": { persona } }`.
    ///
    /// An invalid ID fails the whole load rather than dropping the entry.
    pub fn load(path: &Path) -> Result<Self, PersonaError> {
        let contents = std::fs::read_to_string(path).map_err(|source| PersonaError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let registry = Self::from_json(&contents).map_err(|source| PersonaError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(
            count = registry.len(),
            path = %path.display(),
            "loaded persona registry"
        );
        Ok(registry)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let personas: HashMap<PersonaId, Persona> = serde_json::from_str(json)?;
        Ok(Self { personas })
    }

    pub fn insert(&mut self, id: PersonaId, persona: Persona) {
        self.personas.insert(id, persona);
    }

    pub fn get(&self, id: &str) -> Result<&Persona, PersonaError> {
        self.personas
            .get(id)
            .ok_or_else(|| PersonaError::NotFound(id.to_string()))
    }

    pub fn ids(&self) -> Vec<&PersonaId> {
        let mut ids: Vec<_> = self.personas.keys().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UA: &str = "Mozilla/5.0 (X11; Linux x86_64) Vigil-Test";

    const REGISTRY: &str = r#"{
        "de-visitor": {
            "headers": { "Accept-Language": "de-DE,de;q=0.9" },
            "viewport": { "width": 390, "height": 844 },
            "proxy": { "server": "http://proxy.example:3128" }
        },
        "low-vision": {
            "accessibility": "low-vision",
            "proxy": "socks5://127.0.0.1:1080"
        }
    }"#;

    #[test]
    fn test_neutral_persona_defaults() {
        let params = Persona::default().session_params(UA);
        assert_eq!(params.user_agent, UA);
        assert_eq!(params.locale, "en-US");
        assert_eq!(params.viewport, Viewport { width: 1280, height: 800 });
        assert!(params.extra_headers.is_empty());
        assert!(params.proxy.is_none());
        assert!(params.accessibility.is_none());
    }

    #[test]
    fn test_registry_parses_personas() {
        let registry = PersonaRegistry::from_json(REGISTRY).expect("parse registry");
        assert_eq!(registry.len(), 2);

        let de = registry.get("de-visitor").expect("de persona");
        let params = de.session_params(UA);
        assert_eq!(params.locale, "de-DE");
        assert_eq!(params.viewport.width, 390);
        assert_eq!(params.proxy.as_deref(), Some("http://proxy.example:3128"));
        assert_eq!(
            params.extra_headers.get("Accept-Language").map(String::as_str),
            Some("de-DE,de;q=0.9")
        );

        let low_vision = registry.get("low-vision").expect("low-vision persona");
        let params = low_vision.session_params(UA);
        assert_eq!(params.accessibility, Some(AccessibilityMode::LowVision));
        assert_eq!(params.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
    }

    #[test]
    fn test_registry_keeps_ids_as_written() {
        let registry = PersonaRegistry::from_json(
            r#"{"EU-Visitor": {"headers": {"Accept-Language": "fr-FR"}}, "mobile.ios": {}}"#,
        )
        .expect("parse registry");
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("EU-Visitor").expect("EU persona").session_params(UA).locale,
            "fr-FR"
        );
        assert!(registry.get("mobile.ios").is_ok());
        assert!(registry.get("eu-visitor").is_err());
    }

    #[test]
    fn test_invalid_id_fails_the_load() {
        for json in [r#"{"": {}}"#, r#"{" padded ": {}}"#] {
            let err = PersonaRegistry::from_json(json).expect_err("invalid id");
            assert!(err.to_string().contains("invalid persona id"), "{err}");
        }
    }

    #[test]
    fn test_missing_persona_is_an_error() {
        let registry = PersonaRegistry::from_json(REGISTRY).expect("parse registry");
        let err = registry.get("nobody").unwrap_err();
        assert!(matches!(err, PersonaError::NotFound(id) if id == "nobody"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("personas.json");
        std::fs::write(&path, REGISTRY).expect("write registry");

        let registry = PersonaRegistry::load(&path).expect("load registry");
        let ids: Vec<_> = registry.ids().into_iter().map(PersonaId::as_str).collect();
        assert_eq!(ids, vec!["de-visitor", "low-vision"]);

        std::fs::write(&path, "{ not json").expect("write broken registry");
        assert!(matches!(
            PersonaRegistry::load(&path),
            Err(PersonaError::Parse { .. })
        ));
    }

    #[test]
    fn test_user_agent_override() {
        let persona = Persona {
            user_agent: Some("CustomAgent/1.0".to_string()),
            ..Persona::default()
        };
        assert_eq!(persona.session_params(UA).user_agent, "CustomAgent/1.0");
    }
}
