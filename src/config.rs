//! Settings loading.
//!
//! Settings live in `<config_dir>/supportdash/settings.toml`. Every section
//! is optional; a missing file yields the built-in defaults.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::metrics::Exclusions;
use crate::site::{SectionName, TopSectionConfig};

/// Environment variable consulted when `[analytics].token` is absent.
pub const TOKEN_ENV: &str = "SUPPORTDASH_ANALYTICS_TOKEN";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub analytics: AnalyticsConfig,
    pub mail: MailConfig,
    pub aggregation: AggregationConfig,
    pub sections: SectionsConfig,
    /// Assignee display name to email address.
    pub staff: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub endpoint: String,
    pub token: Option<String>,
    pub counter_id: u64,
    /// Value of the `filters` parameter scoping the report to one site.
    pub filter: String,
    pub limit: u32,
    pub timeout_secs: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api-metrika.yandex.net/stat/v1/data".into(),
            token: None,
            counter_id: 23871871,
            filter: "ym:s:startURLPathLevel1=='https://mbufk.roskazna.gov.ru/'".into(),
            limit: 10000,
            timeout_secs: 30,
        }
    }
}

impl AnalyticsConfig {
    pub fn token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var(TOKEN_ENV).ok())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// SMTP relay; notifications are disabled when unset.
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    /// Use STARTTLS instead of an unencrypted session.
    pub starttls: bool,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 25,
            username: None,
            password: None,
            from: "supportdash@localhost".into(),
            starttls: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub excluded_units: Vec<String>,
    pub excluded_reporters: Vec<String>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            excluded_units: vec!["19. Отдел сопровождения пользователей".into(), "ЦОКР".into()],
            excluded_reporters: Vec::new(),
        }
    }
}

impl AggregationConfig {
    pub fn exclusions(&self) -> Exclusions {
        Exclusions {
            units: self.excluded_units.clone(),
            reporters: self.excluded_reporters.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SectionsConfig {
    pub top_names: Vec<SectionName>,
    pub allow_list: Vec<String>,
    pub special_interest: String,
    pub budget_names: Vec<SectionName>,
    /// Level-3 URL selecting the civil-service sub-area.
    pub sub_area_url: String,
    pub sub_area_names: Vec<SectionName>,
}

impl Default for SectionsConfig {
    fn default() -> Self {
        let names = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(fragment, name)| SectionName::new(fragment, name))
                .collect::<Vec<_>>()
        };
        Self {
            top_names: names(&[
                ("molodezhnyy-sovet/", "Молодежный совет"),
                ("elektronnyy-byudzhet/", "Электронный бюджет"),
                ("o-kaznachejstve/", "О Межрегиональном бухгалтерском УФК"),
                ("inaya-deyatelnost/", "Иная деятельность"),
                ("dokumenty/", "Документы"),
                ("gis/", "Информационные системы"),
                ("novosti-i-soobshheniya/", "Новости и сообщения"),
                ("poisk/", "Поиск"),
                ("priem-obrashhenij/", "Прием обращений"),
            ]),
            allow_list: [
                "Электронный бюджет",
                "О Межрегиональном бухгалтерском УФК",
                "Иная деятельность",
                "Документы",
                "Прием обращений",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            special_interest: "molodezhnyy-sovet".into(),
            budget_names: names(&[
                ("podklyuchenie-k-sisteme", "Подключение к системе"),
                ("podsistema-ucheta-i-otchetnosti", "Подсистема учета и отчетности"),
                ("servis-upravleniya-komandirovaniem", "Сервис управления командированием"),
                ("podsistema-upravleniya-oplatoy-truda", "Подсистема управления оплатой труда"),
                (
                    "tekhnicheskaya-podderzhka-gis-elektronnogo-byudzheta",
                    "Тех. поддержка ГИИС \"Электронный бюджет\"",
                ),
                (
                    "podsistema-ucheta-nefinansovykh-aktivov",
                    "Подсистема упр. нефинансовыми активами",
                ),
            ]),
            sub_area_url: "https://mbufk.roskazna.gov.ru/inaya-deyatelnost/\
                           gosudarstvennaya-sluzhba-v-mezhregionalnom-bukhgalterskom-ufk/"
                .into(),
            sub_area_names: names(&[
                (
                    "konkurs-na-zameshchenie-vakantnykh-dolzhnostey",
                    "Конкурс на замещение вакантных должностей",
                ),
                ("vakansii", "Вакансии"),
                (
                    "gosudarstvennaya-sluzhba-v-mezhregionalnom-bukhgalterskom-ufk",
                    "Государственная служба в МБУ ФК",
                ),
            ]),
        }
    }
}

impl SectionsConfig {
    pub fn top_section_config(&self) -> TopSectionConfig {
        TopSectionConfig {
            names: self.top_names.clone(),
            allow_list: self.allow_list.clone(),
            special_interest: self.special_interest.clone(),
        }
    }
}

fn check_names(table: &str, names: &[SectionName]) -> Result<()> {
    let mut seen = HashSet::new();
    for n in names {
        if n.fragment.trim().is_empty() {
            return Err(Error::Configuration(format!("{table}: empty path fragment")));
        }
        if n.name.trim().is_empty() {
            return Err(Error::Configuration(format!(
                "{table}: empty display name for '{}'",
                n.fragment
            )));
        }
        if !seen.insert(n.fragment.as_str()) {
            return Err(Error::Configuration(format!(
                "{table}: duplicate fragment '{}'",
                n.fragment
            )));
        }
    }
    Ok(())
}

impl Settings {
    /// Load from the default location, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            log::info!("No settings file at {}, using defaults", path.display());
            return Ok(Settings::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Configuration(format!("failed to parse {}: {e}", path.display())))
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("supportdash")
            .join("settings.toml")
    }

    /// Reject malformed lookup tables and endpoints before serving anything.
    pub fn validate(&self) -> Result<()> {
        check_names("sections.top_names", &self.sections.top_names)?;
        check_names("sections.budget_names", &self.sections.budget_names)?;
        check_names("sections.sub_area_names", &self.sections.sub_area_names)?;
        if self.sections.allow_list.is_empty() {
            return Err(Error::Configuration("sections.allow_list is empty".into()));
        }
        url::Url::parse(&self.analytics.endpoint).map_err(|e| {
            Error::Configuration(format!(
                "analytics.endpoint '{}' is not a URL: {e}",
                self.analytics.endpoint
            ))
        })?;
        if self.analytics.limit == 0 {
            return Err(Error::Configuration("analytics.limit must be positive".into()));
        }
        Ok(())
    }
}
