use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{Result, WsaError};
use crate::types::Mode;

/// Environment variable that points at an alternative config file
pub const CONFIG_PATH_ENV: &str = "WSA_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "wsa.toml";

/// Everything the application reads from `wsa.toml`. Every section falls back
/// to the stock fulfillment settings, so an absent file is a valid config.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub columns: ColumnNames,
    pub filters: FilterConfigs,
    pub quality: QualityConfig,
    pub export: ExportConfig,
    pub logging: LogConfig,
    pub sheets: SheetsConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ColumnNames {
    pub order_id: String,
    pub workorder: String,
    pub date_created: String,
    pub service_no: String,
    pub crm_order_type: String,
    pub status: String,
    pub address: String,
    pub customer_name: String,
    pub workzone: String,
    pub booking_date: String,
    pub contact_number: String,
    pub mitra: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            order_id: COL_ORDER_ID.to_string(),
            workorder: COL_WORKORDER.to_string(),
            date_created: COL_DATE_CREATED.to_string(),
            service_no: COL_SERVICE_NO.to_string(),
            crm_order_type: COL_CRM_ORDER_TYPE.to_string(),
            status: COL_STATUS.to_string(),
            address: COL_ADDRESS.to_string(),
            customer_name: COL_CUSTOMER_NAME.to_string(),
            workzone: COL_WORKZONE.to_string(),
            booking_date: COL_BOOKING_DATE.to_string(),
            contact_number: COL_CONTACT_NUMBER.to_string(),
            mitra: COL_MITRA.to_string(),
        }
    }
}

impl ColumnNames {
    /// Configured name for a stock column name; any other name is returned as is
    pub fn resolve(&self, name: &str) -> String {
        let configured = match name {
            COL_ORDER_ID => &self.order_id,
            COL_WORKORDER => &self.workorder,
            COL_DATE_CREATED => &self.date_created,
            COL_SERVICE_NO => &self.service_no,
            COL_CRM_ORDER_TYPE => &self.crm_order_type,
            COL_STATUS => &self.status,
            COL_ADDRESS => &self.address,
            COL_CUSTOMER_NAME => &self.customer_name,
            COL_WORKZONE => &self.workzone,
            COL_BOOKING_DATE => &self.booking_date,
            COL_CONTACT_NUMBER => &self.contact_number,
            COL_MITRA => &self.mitra,
            _ => return name.to_string(),
        };
        configured.clone()
    }

    fn resolve_all(&self, names: &[String]) -> Vec<String> {
        names.iter().map(|name| self.resolve(name)).collect()
    }
}

/// Rule record for one mode. A section given in the file must be complete
/// apart from the optional fields.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModeFilterConfig {
    /// Regex fragments matched against the order id; any match keeps the row
    pub patterns: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
    /// Allowed CRM order types; empty means no CRM filter
    #[serde(default)]
    pub crm_order_types: Vec<String>,
    /// Allowed statuses; empty means no status filter
    #[serde(default)]
    pub status_filter: Vec<String>,
    /// Partner written into rows that have none
    #[serde(default)]
    pub default_mitra: Option<String>,
    pub required_columns: Vec<String>,
    /// Column compared against the existing-id set
    pub dedupe_column: String,
    pub output_columns: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ModeFilterConfig {
    pub fn wsa_default() -> Self {
        Self {
            patterns: strings(&["AO", "PDA", "WSA"]),
            case_sensitive: false,
            crm_order_types: strings(&["CREATE", "MIGRATE"]),
            status_filter: Vec::new(),
            default_mitra: None,
            required_columns: strings(&[COL_ORDER_ID, COL_CRM_ORDER_TYPE, COL_DATE_CREATED]),
            dedupe_column: COL_ORDER_ID.to_string(),
            output_columns: strings(&[
                COL_DATE_CREATED,
                COL_WORKORDER,
                COL_ORDER_ID,
                COL_SERVICE_NO,
                COL_CRM_ORDER_TYPE,
                COL_STATUS,
                COL_ADDRESS,
                COL_CUSTOMER_NAME,
                COL_WORKZONE,
                COL_BOOKING_DATE,
                COL_CONTACT_NUMBER,
            ]),
        }
    }

    pub fn modoroso_default() -> Self {
        Self {
            patterns: strings(&["-MO", "-DO"]),
            case_sensitive: false,
            crm_order_types: Vec::new(),
            status_filter: Vec::new(),
            default_mitra: Some(DEFAULT_PARTNER.to_string()),
            required_columns: strings(&[COL_ORDER_ID, COL_WORKORDER, COL_DATE_CREATED]),
            dedupe_column: COL_WORKORDER.to_string(),
            output_columns: strings(&[
                COL_DATE_CREATED,
                COL_WORKORDER,
                COL_ORDER_ID,
                COL_SERVICE_NO,
                COL_CRM_ORDER_TYPE,
                COL_STATUS,
                COL_ADDRESS,
                COL_CUSTOMER_NAME,
                COL_WORKZONE,
                COL_CONTACT_NUMBER,
                COL_MITRA,
            ]),
        }
    }

    pub fn wappr_default() -> Self {
        Self {
            patterns: strings(&["AO", "PDA"]),
            case_sensitive: false,
            crm_order_types: Vec::new(),
            status_filter: strings(&["WAPPR"]),
            default_mitra: None,
            required_columns: strings(&[COL_ORDER_ID, COL_STATUS, COL_DATE_CREATED]),
            dedupe_column: COL_ORDER_ID.to_string(),
            output_columns: ModeFilterConfig::wsa_default().output_columns,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfigs {
    pub wsa: ModeFilterConfig,
    pub modoroso: ModeFilterConfig,
    pub wappr: ModeFilterConfig,
}

impl Default for FilterConfigs {
    fn default() -> Self {
        Self {
            wsa: ModeFilterConfig::wsa_default(),
            modoroso: ModeFilterConfig::modoroso_default(),
            wappr: ModeFilterConfig::wappr_default(),
        }
    }
}

impl FilterConfigs {
    pub fn for_mode(&self, mode: Mode) -> &ModeFilterConfig {
        match mode {
            Mode::Wsa => &self.wsa,
            Mode::Modoroso => &self.modoroso,
            Mode::Wappr => &self.wappr,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Null share per column above which an issue is raised
    pub null_threshold: f64,
    /// Duplicate share above which an issue is raised
    pub duplicate_threshold: f64,
    /// Column that decides uniqueness when present; full-row equality otherwise
    pub key_column: Option<String>,
    pub phone_column: Option<String>,
    pub date_column: Option<String>,
    pub order_column: Option<String>,
    /// Substrings a well-formed order id carries
    pub order_patterns: Vec<String>,
    /// Numeric columns with fewer values are not checked for outliers
    pub outlier_min_values: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            null_threshold: 0.1,
            duplicate_threshold: 0.05,
            key_column: None,
            phone_column: Some(COL_CONTACT_NUMBER.to_string()),
            date_column: Some(COL_DATE_CREATED.to_string()),
            order_column: Some(COL_ORDER_ID.to_string()),
            order_patterns: strings(&["AO", "PDA", "WSA", "-MO", "-DO"]),
            outlier_min_values: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    pub filename_prefix: String,
    /// chrono layout of the date stamped into file names
    pub filename_date_format: String,
    /// Layout of dates in the finalized output
    pub display_date_format: String,
    pub csv_bom: bool,
    pub sheet_name: String,
    pub max_column_width: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            filename_prefix: "WSA_Cleaned".to_string(),
            filename_date_format: "%d%m%Y".to_string(),
            display_date_format: DISPLAY_DATE_FORMAT.to_string(),
            csv_bom: true,
            sheet_name: "Data".to_string(),
            max_column_width: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    pub enabled: bool,
    pub log_dir: String,
    pub file_prefix: String,
    pub max_files: usize,
    pub level: String,
    pub console_output: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_dir: "logs".to_string(),
            file_prefix: "wsa_app".to_string(),
            max_files: 5,
            level: "info".to_string(),
            console_output: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub base_url: String,
    pub spreadsheet_id: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub worksheet_wsa: String,
    pub worksheet_modoroso: String,
    pub worksheet_wappr: String,
    /// Header of the id column; the first column is used when unset
    pub id_column: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sheets.googleapis.com".to_string(),
            spreadsheet_id: String::new(),
            api_key_env: "WSA_SHEETS_API_KEY".to_string(),
            worksheet_wsa: "Sheet1".to_string(),
            worksheet_modoroso: "MODOROSO_JAKTIMSEL".to_string(),
            worksheet_wappr: "WAPPR_DATA".to_string(),
            id_column: None,
            timeout_secs: 30,
        }
    }
}

impl SheetsConfig {
    pub fn worksheet_for(&self, mode: Mode) -> &str {
        match mode {
            Mode::Wsa => &self.worksheet_wsa,
            Mode::Modoroso => &self.worksheet_modoroso,
            Mode::Wappr => &self.worksheet_wappr,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    pub batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { batch_size: 1000 }
    }
}

impl AppConfig {
    /// Load from `$WSA_CONFIG`, then `wsa.toml`; defaults when neither exists
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        if path.exists() {
            Self::from_path(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            WsaError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Quality settings with stock column names mapped through `[columns]`
    pub fn quality_config(&self) -> QualityConfig {
        let resolve = |column: &Option<String>| column.as_deref().map(|c| self.columns.resolve(c));
        QualityConfig {
            key_column: resolve(&self.quality.key_column),
            phone_column: resolve(&self.quality.phone_column),
            date_column: resolve(&self.quality.date_column),
            order_column: resolve(&self.quality.order_column),
            ..self.quality.clone()
        }
    }

    /// Compile the immutable rule set a processor runs with. Stock column
    /// names in the mode rules follow any renames under `[columns]`.
    pub fn processor_config(&self, mode: Mode) -> Result<ProcessorConfig> {
        let rules = self.filters.for_mode(mode);
        let order_pattern = compile_patterns(&rules.patterns, rules.case_sensitive)?;
        Ok(ProcessorConfig {
            mode,
            order_pattern,
            crm_order_types: rules.crm_order_types.clone(),
            status_filter: rules.status_filter.clone(),
            default_mitra: rules.default_mitra.clone(),
            required_columns: self.columns.resolve_all(&rules.required_columns),
            dedupe_column: self.columns.resolve(&rules.dedupe_column),
            output_columns: self.columns.resolve_all(&rules.output_columns),
            columns: self.columns.clone(),
            display_date_format: self.export.display_date_format.clone(),
            default_sort_column: self.columns.workzone.clone(),
        })
    }
}

fn compile_patterns(patterns: &[String], case_sensitive: bool) -> Result<Option<Regex>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let joined = patterns.join("|");
    let regex = RegexBuilder::new(&joined)
        .case_insensitive(!case_sensitive)
        .build()?;
    Ok(Some(regex))
}

/// Immutable rule set for one processor. Built once, shared by every chunk.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub mode: Mode,
    /// `None` when the mode has no order-id patterns
    pub order_pattern: Option<Regex>,
    pub crm_order_types: Vec<String>,
    pub status_filter: Vec<String>,
    pub default_mitra: Option<String>,
    pub required_columns: Vec<String>,
    pub dedupe_column: String,
    pub output_columns: Vec<String>,
    pub columns: ColumnNames,
    pub display_date_format: String,
    pub default_sort_column: String,
}

impl ProcessorConfig {
    /// Stock rules for a mode
    pub fn for_mode(mode: Mode) -> Result<Self> {
        AppConfig::default().processor_config(mode)
    }
}
