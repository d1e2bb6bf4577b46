//! Loading, validating, saving and editing mapping configurations.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::conf::{derive_default_mapping_config, derive_sample_mapping_config};
use crate::error::ConfigError;
use crate::spec::{
    EnumAlignment, EnumFreezePanes, SpecColumnConfig, SpecHeaderFormatting, SpecMappingConfig,
    SpecVoidConfig,
};
use crate::util::{parse_cell_ref, parse_hex_color};

////////////////////////////////////////////////////////////////////////////////
// #region Loading

/// Load and validate a configuration file, logging load warnings.
pub fn load_config(path: impl AsRef<Path>) -> Result<SpecMappingConfig, ConfigError> {
    let (config, l_warnings) = load_config_with_warnings(path)?;
    for c_warning in &l_warnings {
        warn!(target: "xlmap::config", "{c_warning}");
    }
    Ok(config)
}

/// Load and validate a configuration file, returning load warnings.
pub fn load_config_with_warnings(
    path: impl AsRef<Path>,
) -> Result<(SpecMappingConfig, Vec<String>), ConfigError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let c_text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded configuration text");
    parse_config_str(&c_text)
}

/// Parse and validate configuration JSON.
pub fn parse_config_str(text: &str) -> Result<(SpecMappingConfig, Vec<String>), ConfigError> {
    let config: SpecMappingConfig = serde_json::from_str(text)?;
    validate_config(config)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Validation

/// Normalize and validate a configuration.
///
/// Names are trimmed wherever they appear. Alignment overrides and
/// `column_order` entries naming no output column are dropped and reported
/// as warnings.
pub fn validate_config(
    mut config: SpecMappingConfig,
) -> Result<(SpecMappingConfig, Vec<String>), ConfigError> {
    let mut l_warnings = Vec::new();

    if config.output_columns.is_empty() {
        return Err(ConfigError::EmptyOutputColumns);
    }

    let mut set_names = HashSet::new();
    for (idx_col, col) in config.output_columns.iter_mut().enumerate() {
        col.name = trim_name(&col.name);
        if col.name.is_empty() {
            return Err(ConfigError::EmptyColumnName {
                position: idx_col + 1,
            });
        }
        if !set_names.insert(col.name.clone()) {
            return Err(ConfigError::DuplicateColumnName {
                name: col.name.clone(),
            });
        }
        validate_column(col)?;
    }

    validate_header_formatting(&config.header_formatting)?;

    config.column_name_alignment = std::mem::take(&mut config.column_name_alignment)
        .into_iter()
        .map(|(name, alignment)| (trim_name(&name), alignment))
        .collect();
    for name in config
        .column_order
        .iter_mut()
        .chain(config.void_filter.zero_columns.iter_mut())
    {
        *name = trim_name(name);
    }
    if let Some(EnumFreezePanes::Spec(spec)) = &mut config.general_settings.freeze_panes {
        for name in &mut spec.freeze_columns {
            *name = trim_name(name);
        }
    }

    config.column_name_alignment.retain(|name, _| {
        let if_known = set_names.contains(name);
        if !if_known {
            l_warnings.push(format!(
                "column_name_alignment entry {name:?} matches no output column and is ignored"
            ));
        }
        if_known
    });

    config.column_order.retain(|name| {
        let if_known = set_names.contains(name);
        if !if_known {
            l_warnings.push(format!(
                "column_order entry {name:?} matches no output column and is ignored"
            ));
        }
        if_known
    });

    match &config.general_settings.freeze_panes {
        Some(EnumFreezePanes::CellRef(c_ref)) if parse_cell_ref(c_ref).is_none() => {
            return Err(ConfigError::InvalidFreezePanes {
                value: c_ref.clone(),
            });
        }
        Some(EnumFreezePanes::Spec(spec)) => {
            if let Some(name) = spec.freeze_columns.iter().find(|name| !set_names.contains(*name)) {
                return Err(ConfigError::UnknownFreezeColumn { name: name.clone() });
            }
        }
        _ => {}
    }

    if config.void_filter.enabled && config.void_filter.zero_columns.is_empty() {
        l_warnings.push("void filter is enabled but 'zero_columns' is empty; no rows will be voided".to_string());
    }

    Ok((config, l_warnings))
}

fn trim_name(name: &str) -> String {
    name.trim().to_string()
}

fn validate_column(col: &SpecColumnConfig) -> Result<(), ConfigError> {
    if let Some(n_width) = col.width
        && !(n_width.is_finite() && n_width > 0.0)
    {
        return Err(ConfigError::InvalidWidth {
            name: col.name.clone(),
            width: n_width,
        });
    }
    if col.formatting.date_format.is_some() && col.formatting.date_range_format.is_some() {
        return Err(ConfigError::ConflictingDateFormats {
            name: col.name.clone(),
        });
    }
    Ok(())
}

fn validate_header_formatting(header: &SpecHeaderFormatting) -> Result<(), ConfigError> {
    for (field, value) in [
        ("background_color", &header.background_color),
        ("font_color", &header.font_color),
    ] {
        if !value.trim().is_empty() && parse_hex_color(value).is_none() {
            return Err(ConfigError::InvalidColor {
                field,
                value: value.clone(),
            });
        }
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Saving

/// Write a configuration as 4-space indented JSON, creating parent directories.
pub fn save_config(config: &SpecMappingConfig, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let map_write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir_parent) = path.parent()
        && !dir_parent.as_os_str().is_empty()
    {
        fs::create_dir_all(dir_parent).map_err(map_write_err)?;
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    config.serialize(&mut ser)?;
    buf.push(b'\n');

    fs::write(path, buf).map_err(map_write_err)?;
    debug!(path = %path.display(), "saved configuration");
    Ok(())
}

/// Built-in configuration used when no file is supplied.
pub fn default_config() -> SpecMappingConfig {
    derive_default_mapping_config()
}

/// Write the sample configuration to `path` and return it.
pub fn create_sample_config(path: impl AsRef<Path>) -> Result<SpecMappingConfig, ConfigError> {
    let config = derive_sample_mapping_config();
    save_config(&config, path)?;
    Ok(config)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Builder

/// Mutable editing surface producing validated, immutable snapshots.
///
/// A processing run only ever sees the [`SpecMappingConfig`] returned by
/// [`Self::build`]; later edits do not affect it.
#[derive(Debug, Clone)]
pub struct MappingConfigBuilder {
    config: SpecMappingConfig,
}

impl Default for MappingConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingConfigBuilder {
    /// Start from an empty column list with default styling.
    pub fn new() -> Self {
        let mut config = derive_default_mapping_config();
        config.output_columns.clear();
        Self { config }
    }

    pub fn from_config(config: SpecMappingConfig) -> Self {
        Self { config }
    }

    pub fn columns(&self) -> &[SpecColumnConfig] {
        &self.config.output_columns
    }

    pub fn push_column(&mut self, column: SpecColumnConfig) -> &mut Self {
        self.config.output_columns.push(column);
        self
    }

    /// Insert at `idx`, clamped to the end of the list.
    pub fn insert_column(&mut self, idx: usize, column: SpecColumnConfig) -> &mut Self {
        let idx = idx.min(self.config.output_columns.len());
        self.config.output_columns.insert(idx, column);
        self
    }

    /// Remove a column and any alignment override keyed by its name.
    pub fn remove_column(&mut self, name: &str) -> Option<SpecColumnConfig> {
        let idx = self.config.output_columns.iter().position(|col| col.name == name)?;
        self.config.column_name_alignment.remove(name);
        Some(self.config.output_columns.remove(idx))
    }

    /// Move the column at `idx_from` to `idx_to`; out-of-range moves are ignored.
    pub fn move_column(&mut self, idx_from: usize, idx_to: usize) -> &mut Self {
        let n_cols = self.config.output_columns.len();
        if idx_from < n_cols && idx_to < n_cols {
            let column = self.config.output_columns.remove(idx_from);
            self.config.output_columns.insert(idx_to, column);
        }
        self
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut SpecColumnConfig> {
        self.config.output_columns.iter_mut().find(|col| col.name == name)
    }

    pub fn header_formatting(&mut self, header: SpecHeaderFormatting) -> &mut Self {
        self.config.header_formatting = header;
        self
    }

    pub fn column_name_alignment(&mut self, name: impl Into<String>, alignment: EnumAlignment) -> &mut Self {
        self.config.column_name_alignment.insert(name.into(), alignment);
        self
    }

    pub fn auto_fit_columns(&mut self, if_auto_fit: bool) -> &mut Self {
        self.config.general_settings.auto_fit_columns = if_auto_fit;
        self
    }

    pub fn freeze_panes(&mut self, freeze_panes: Option<EnumFreezePanes>) -> &mut Self {
        self.config.general_settings.freeze_panes = freeze_panes;
        self
    }

    pub fn void_filter(&mut self, enabled: bool, zero_columns: Vec<String>) -> &mut Self {
        self.config.void_filter = SpecVoidConfig {
            enabled,
            zero_columns,
        };
        self
    }

    pub fn column_order(&mut self, column_order: Vec<String>) -> &mut Self {
        self.config.column_order = column_order;
        self
    }

    /// Validate and snapshot the current state, logging load warnings.
    pub fn build(&self) -> Result<SpecMappingConfig, ConfigError> {
        let (config, l_warnings) = validate_config(self.config.clone())?;
        for c_warning in &l_warnings {
            warn!(target: "xlmap::config", "{c_warning}");
        }
        Ok(config)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
