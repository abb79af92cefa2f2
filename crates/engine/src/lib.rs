//! # Confmap Engine
//!
//! The Confmap Engine backs configuration editors that show the same data two
//! ways: as editable key/value rows and as a YAML or JSON document. It keeps
//! both views consistent, validates keys as the user types, and turns the
//! result into the save request for a ConfigMap or Secret.
//!
//! ## Key Features
//!
//! - **Row model**: Ordered, copy-on-write key/value rows with per-row errors
//! - **Text codec**: Order-preserving YAML/JSON encoding that always re-parses to the same strings
//! - **Dual view**: GUI/TEXT state machine that never loses committed rows to malformed text
//! - **Payloads**: Typed builders for inline, existing and external (KES/ESO) data
//!
//! ## Usage
//!
//! ```rust
//! use confmap_engine::{read_document, DualViewController};
//! use confmap_types::ViewMode;
//! use confmap_util::KeyRule;
//!
//! let temp_dir = tempfile::tempdir()?;
//! let path = temp_dir.path().join("app.yaml");
//! std::fs::write(&path, "LOG_LEVEL: debug\nRETRIES: \"3\"\n")?;
//!
//! let (codec, outcome) = read_document(&path, 2, &KeyRule::config_map())?;
//! let mut view = DualViewController::new(outcome.model, codec, KeyRule::config_map());
//! view.switch_to(ViewMode::Text);
//! view.set_text("LOG_LEVEL: debug\nRETRIES: \"3\"\nTIMEOUT: \"30\"\n")?;
//! view.switch_to(ViewMode::Gui);
//! assert_eq!(view.current_model().len(), 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`model`**: The key/value row model and its validation
//! - **`codec`**: YAML/JSON encoding and decoding with diagnostics
//! - **`dual_view`**: GUI/TEXT mode controller
//! - **`validation`**: Name, mount path, file permission and sub-path rules
//! - **`secret`**: External secret specs and locked values
//! - **`payload`**: Save request assembly
//! - **`diff`**: Key-level comparison of saved and edited data

use std::{fs, path::Path};

use anyhow::{Context, Result};
use confmap_types::TextFormat;
use confmap_util::KeyRule;

pub mod codec;
pub mod diff;
pub mod dual_view;
pub mod error;
pub mod model;
pub mod payload;
pub mod secret;
pub mod validation;

// Re-export commonly used types for convenience
pub use codec::{DecodeOutcome, EncodedDocument, TextCodec};
pub use diff::{DiffSummary, MappingChange, MappingDiff, diff_mappings};
pub use dual_view::{DualViewController, SwitchOutcome};
pub use error::{ControllerError, EntryError, ParseError, SubmissionError};
pub use model::{KeyValueModel, ValidationReport};
pub use payload::{ConfigMapSource, ConfigPayloadBuilder, ConfigSource, SecretSource, SubPath, Usage, VolumeMount};
pub use secret::{EsoProvider, EsoSpec, KesProvider, LockedSecret, SecretSpecError};
pub use validation::{FieldError, FilePermission};

/// Reads a YAML or JSON document from disk, choosing the format by extension.
///
/// Returns the codec matching the file so callers can write edits back in the
/// same format.
pub fn read_document(path: &Path, indent: usize, rule: &KeyRule) -> Result<(TextCodec, DecodeOutcome)> {
    let content = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let codec = TextCodec::new(TextFormat::from_path(path), indent);
    let outcome = codec
        .try_decode(&content, rule)
        .with_context(|| format!("parse {}", path.display()))?;
    Ok((codec, outcome))
}
