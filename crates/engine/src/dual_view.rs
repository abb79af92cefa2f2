//! GUI/TEXT mode state machine for a single configuration editor.
//!
//! Exactly one side is authoritative at a time. Switching to the text view
//! serializes the committed model and keeps it as a snapshot; switching back
//! decodes the current text. When that decode fails the snapshot is
//! restored, so malformed text never replaces good rows.

use confmap_types::ViewMode;
use confmap_util::KeyRule;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::codec::{EncodedDocument, TextCodec};
use crate::error::{ControllerError, ParseError, SubmissionError};
use crate::model::KeyValueModel;

/// What happened on a mode switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The requested mode was already active.
    Unchanged,
    /// The model was serialized into the text buffer.
    ToText,
    /// The text was decoded and committed.
    ToGui { entries: usize },
    /// The text did not parse; the pre-edit snapshot is back in place.
    Reverted { error: ParseError },
}

#[derive(Debug, Clone)]
pub struct DualViewController {
    mode: ViewMode,
    codec: TextCodec,
    rule: KeyRule,
    /// Committed GUI rows; the pre-edit snapshot while the text view is active.
    model: KeyValueModel,
    text: String,
    /// Last successful decode, possibly of an earlier buffer.
    pending: Option<KeyValueModel>,
    /// Decode result of exactly the current `text`, once computed.
    decoded: Option<Result<KeyValueModel, ParseError>>,
    document: EncodedDocument,
}

impl DualViewController {
    /// Opens an editor in the GUI view.
    pub fn new(model: KeyValueModel, codec: TextCodec, rule: KeyRule) -> Self {
        Self {
            mode: ViewMode::Gui,
            codec,
            rule,
            model,
            text: String::new(),
            pending: None,
            decoded: None,
            document: EncodedDocument::default(),
        }
    }

    /// Opens an editor in the text view with `text` as the buffer.
    ///
    /// The snapshot restored on a failed switch is whatever `text` decodes
    /// to, or an empty model when it does not parse.
    pub fn text_first(text: impl Into<String>, codec: TextCodec, rule: KeyRule) -> Self {
        let text = text.into();
        let outcome = codec.decode(&text, &rule, &KeyValueModel::default());
        let decoded = match &outcome.document.parse_error {
            Some(error) => Err(error.clone()),
            None => Ok(outcome.model.clone()),
        };
        Self {
            mode: ViewMode::Text,
            codec,
            rule,
            model: outcome.model,
            text,
            pending: decoded.as_ref().ok().cloned(),
            decoded: Some(decoded),
            document: outcome.document,
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn codec(&self) -> TextCodec {
        self.codec
    }

    pub fn rule(&self) -> &KeyRule {
        &self.rule
    }

    /// Diagnostics of the most recent decode.
    pub fn document(&self) -> &EncodedDocument {
        &self.document
    }

    pub fn parse_error(&self) -> Option<&ParseError> {
        self.document.parse_error.as_ref()
    }

    /// `true` when leaving the text view now would discard the text edits.
    pub fn will_discard_edits(&self) -> bool {
        if self.mode != ViewMode::Text {
            return false;
        }
        match &self.decoded {
            Some(decoded) => decoded.is_err(),
            None => self.codec.try_decode(&self.text, &self.rule).is_err(),
        }
    }

    /// The text as the user sees it: the live buffer in the text view, the
    /// serialized model otherwise.
    pub fn current_text(&self) -> String {
        match self.mode {
            ViewMode::Text => self.text.clone(),
            ViewMode::Gui => self.codec.encode(&self.model),
        }
    }

    /// The rows as they stand: the committed model in the GUI view, the last
    /// good decode (or the snapshot) in the text view.
    pub fn current_model(&self) -> &KeyValueModel {
        match self.mode {
            ViewMode::Gui => &self.model,
            ViewMode::Text => self.pending.as_ref().unwrap_or(&self.model),
        }
    }

    /// Flips between the two views.
    pub fn toggle(&mut self) -> SwitchOutcome {
        let target = match self.mode {
            ViewMode::Gui => ViewMode::Text,
            ViewMode::Text => ViewMode::Gui,
        };
        self.switch_to(target)
    }

    pub fn switch_to(&mut self, target: ViewMode) -> SwitchOutcome {
        if target == self.mode {
            return SwitchOutcome::Unchanged;
        }
        match target {
            ViewMode::Text => {
                self.text = self.codec.encode(&self.model);
                self.pending = Some(self.model.clone());
                self.decoded = None;
                self.document = EncodedDocument::clean(self.text.clone());
                self.mode = ViewMode::Text;
                debug!(format = %self.codec.format(), entries = self.model.len(), "switched to text view");
                SwitchOutcome::ToText
            }
            ViewMode::Gui => {
                let decoded = match self.decoded.take() {
                    Some(decoded) => decoded,
                    None => self.codec.try_decode(&self.text, &self.rule).map(|outcome| {
                        self.document = outcome.document;
                        outcome.model
                    }),
                };
                let outcome = match decoded {
                    Ok(model) => {
                        self.model = model;
                        debug!(entries = self.model.len(), "switched to gui view");
                        SwitchOutcome::ToGui {
                            entries: self.model.len(),
                        }
                    }
                    Err(error) => {
                        warn!(error = %error, "discarding text edits that do not parse; restoring previous rows");
                        self.document = EncodedDocument {
                            text: self.text.clone(),
                            parse_error: Some(error.clone()),
                            ..EncodedDocument::default()
                        };
                        SwitchOutcome::Reverted { error }
                    }
                };
                self.text.clear();
                self.pending = None;
                self.mode = ViewMode::Gui;
                outcome
            }
        }
    }

    /// Replaces the text buffer and refreshes diagnostics.
    pub fn set_text(&mut self, text: impl Into<String>) -> Result<&EncodedDocument, ControllerError> {
        self.require(ViewMode::Text)?;
        let text = text.into();
        if self.decoded.is_some() && text == self.text {
            return Ok(&self.document);
        }
        self.text = text;
        match self.codec.try_decode(&self.text, &self.rule) {
            Ok(outcome) => {
                self.pending = Some(outcome.model.clone());
                self.decoded = Some(Ok(outcome.model));
                self.document = outcome.document;
            }
            Err(error) => {
                self.decoded = Some(Err(error.clone()));
                self.document = EncodedDocument {
                    text: self.text.clone(),
                    parse_error: Some(error),
                    ..EncodedDocument::default()
                };
            }
        }
        Ok(&self.document)
    }

    pub fn set_entry(
        &mut self,
        index: usize,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<bool, ControllerError> {
        self.require(ViewMode::Gui)?;
        Ok(self.model.set_entry(index, key, value))
    }

    pub fn delete_entry(&mut self, index: usize) -> Result<bool, ControllerError> {
        self.require(ViewMode::Gui)?;
        Ok(self.model.delete_entry(index))
    }

    pub fn append_blank(&mut self) -> Result<(), ControllerError> {
        self.require(ViewMode::Gui)?;
        self.model.append_blank();
        Ok(())
    }

    /// Swaps in freshly loaded data, dropping any unsaved text.
    pub fn replace_model(&mut self, model: KeyValueModel) {
        self.model = model;
        self.pending = None;
        self.decoded = None;
        match self.mode {
            ViewMode::Gui => {
                self.text.clear();
                self.document = EncodedDocument::default();
            }
            ViewMode::Text => {
                self.text = self.codec.encode(&self.model);
                self.pending = Some(self.model.clone());
                self.document = EncodedDocument::clean(self.text.clone());
            }
        }
    }

    /// The rows a save action should use, read from whichever side is authoritative.
    pub fn submission_model(&self) -> Result<KeyValueModel, ParseError> {
        match self.mode {
            ViewMode::Gui => Ok(self.model.clone()),
            ViewMode::Text => match &self.decoded {
                Some(decoded) => decoded.clone(),
                None => self.codec.try_decode(&self.text, &self.rule).map(|outcome| outcome.model),
            },
        }
    }

    /// Validates the authoritative side and returns the mapping to save.
    ///
    /// In the GUI view the validated rows replace the model so errors show
    /// next to the offending rows and blank rows disappear.
    pub fn validate_for_submission(&mut self) -> Result<IndexMap<String, String>, SubmissionError> {
        let model = self.submission_model()?;
        let report = model.validate_all(&self.rule);
        let errors = report.errors();
        let valid = report.is_valid;
        let validated = report.into_model();
        let mapping = validated.to_mapping();
        if self.mode == ViewMode::Gui {
            self.model = validated;
        }
        if !valid {
            debug!(errors = errors.len(), "submission blocked by entry errors");
            return Err(SubmissionError::InvalidEntries { errors });
        }
        Ok(mapping)
    }

    fn require(&self, expected: ViewMode) -> Result<(), ControllerError> {
        if self.mode == expected {
            Ok(())
        } else {
            Err(ControllerError::WrongMode {
                expected,
                actual: self.mode,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confmap_types::KeyValueEntry;

    fn controller(pairs: &[(&str, &str)]) -> DualViewController {
        DualViewController::new(
            KeyValueModel::from_pairs(pairs.iter().copied()),
            TextCodec::yaml(),
            KeyRule::config_map(),
        )
    }

    #[test]
    fn gui_to_text_serializes_the_model() {
        let mut view = controller(&[("LOG_LEVEL", "debug"), ("RETRIES", "3")]);
        assert_eq!(view.switch_to(ViewMode::Text), SwitchOutcome::ToText);
        assert_eq!(view.current_text(), "LOG_LEVEL: debug\nRETRIES: \"3\"\n");
        assert_eq!(view.switch_to(ViewMode::Text), SwitchOutcome::Unchanged);
    }

    #[test]
    fn text_to_gui_commits_valid_edits() {
        let mut view = controller(&[("a", "1")]);
        view.toggle();
        view.set_text("a: \"1\"\nb: two\n").expect("text view active");
        assert_eq!(view.current_model().len(), 2);

        assert_eq!(view.switch_to(ViewMode::Gui), SwitchOutcome::ToGui { entries: 2 });
        assert_eq!(view.current_model().entries()[1], KeyValueEntry::new("b", "two"));
    }

    #[test]
    fn failed_parse_restores_snapshot() {
        let mut view = controller(&[("kept", "value")]);
        view.switch_to(ViewMode::Text);
        let document = view.set_text("kept: [broken").expect("text view active");
        assert!(document.parse_error.is_some());
        assert!(view.will_discard_edits());
        assert_eq!(view.current_model().entries()[0].key, "kept");

        let outcome = view.switch_to(ViewMode::Gui);
        assert!(matches!(outcome, SwitchOutcome::Reverted { .. }));
        assert_eq!(view.mode(), ViewMode::Gui);
        assert_eq!(view.current_model().entries(), [KeyValueEntry::new("kept", "value")]);
        assert!(view.parse_error().is_some());
    }

    #[test]
    fn switch_reads_latest_text_even_after_a_bad_intermediate_edit() {
        let mut view = controller(&[("a", "1")]);
        view.switch_to(ViewMode::Text);
        view.set_text("a: [").expect("text view active");
        view.set_text("a: fixed\n").expect("text view active");
        assert!(!view.will_discard_edits());
        assert_eq!(view.switch_to(ViewMode::Gui), SwitchOutcome::ToGui { entries: 1 });
        assert_eq!(view.current_model().entries()[0].value.as_deref(), Some("fixed"));
    }

    #[test]
    fn edits_are_rejected_in_the_wrong_view() {
        let mut view = controller(&[("a", "1")]);
        assert_eq!(
            view.set_text("b: 2"),
            Err(ControllerError::WrongMode {
                expected: ViewMode::Text,
                actual: ViewMode::Gui
            })
        );
        view.switch_to(ViewMode::Text);
        assert!(view.set_entry(0, "x", "y").is_err());
        assert!(view.append_blank().is_err());
        assert!(view.delete_entry(0).is_err());
    }

    #[test]
    fn gui_edits_show_up_in_the_next_text_view() {
        let mut view = controller(&[("a", "1")]);
        view.append_blank().expect("gui view active");
        assert_eq!(view.set_entry(1, "b", "two"), Ok(true));
        view.switch_to(ViewMode::Text);
        assert_eq!(view.current_text(), "a: \"1\"\nb: two\n");
    }

    #[test]
    fn text_first_editor_uses_the_buffer() {
        let view = DualViewController::text_first("token: abc\n", TextCodec::yaml(), KeyRule::secret());
        assert_eq!(view.mode(), ViewMode::Text);
        assert_eq!(view.current_text(), "token: abc\n");
        assert_eq!(view.submission_model().map(|model| model.len()), Ok(1));
    }

    #[test]
    fn replace_model_refreshes_text_view() {
        let mut view = controller(&[("a", "1")]);
        view.switch_to(ViewMode::Text);
        view.set_text("a: [").expect("text view active");
        view.replace_model(KeyValueModel::from_pairs([("fresh", "data")]));
        assert_eq!(view.current_text(), "fresh: data\n");
        assert!(view.parse_error().is_none());
    }

    #[test]
    fn submission_validates_and_prunes_rows() {
        let mut view = DualViewController::new(
            KeyValueModel::new(vec![KeyValueEntry::new("a", "1"), KeyValueEntry::blank(), KeyValueEntry::new("bad key", "x")]),
            TextCodec::yaml(),
            KeyRule::config_map(),
        );
        let error = view.validate_for_submission().expect_err("bad key blocks submission");
        assert!(matches!(error, SubmissionError::InvalidEntries { ref errors } if errors.len() == 1));
        assert_eq!(view.current_model().len(), 2);
        assert!(view.current_model().entries()[1].key_error.is_some());

        view.set_entry(1, "good_key", "x").expect("gui view active");
        let mapping = view.validate_for_submission().expect("valid rows");
        assert_eq!(mapping.keys().collect::<Vec<_>>(), ["a", "good_key"]);
    }

    #[test]
    fn repeated_keys_block_submission_instead_of_merging() {
        let mut view = controller(&[("a", "1"), ("a", "2")]);
        let Err(SubmissionError::InvalidEntries { errors }) = view.validate_for_submission() else {
            panic!("repeated key should block submission");
        };
        assert_eq!(errors.len(), 2);
        assert!(view.current_model().entries().iter().all(|entry| entry.key_error.is_some()));

        view.set_entry(1, "b", "2").expect("gui view active");
        let mapping = view.validate_for_submission().expect("unique keys");
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn text_edits_are_decoded_once_per_buffer() {
        let mut view = controller(&[("a", "1")]);
        view.switch_to(ViewMode::Text);
        assert!(view.decoded.is_none());
        assert!(!view.will_discard_edits());

        view.set_text("a: [").expect("text view active");
        assert!(matches!(view.decoded, Some(Err(_))));
        assert!(view.will_discard_edits());

        view.set_text("a: two\n").expect("text view active");
        assert!(matches!(&view.decoded, Some(Ok(model)) if model.len() == 1));
        assert_eq!(view.submission_model().map(|model| model.to_mapping()["a"].clone()), Ok("two".to_string()));
        assert_eq!(view.switch_to(ViewMode::Gui), SwitchOutcome::ToGui { entries: 1 });
        assert!(view.decoded.is_none());
    }

    #[test]
    fn unedited_round_trip_keeps_unusual_values() {
        let long_key = "k".repeat(1100);
        let model = KeyValueModel::new(vec![
            KeyValueEntry::new(long_key.as_str(), "v"),
            KeyValueEntry::new("sep", "a\u{2028}b"),
        ]);
        let mut view = DualViewController::new(model.clone(), TextCodec::yaml(), KeyRule::config_map());
        view.switch_to(ViewMode::Text);
        assert_eq!(view.switch_to(ViewMode::Gui), SwitchOutcome::ToGui { entries: 2 });
        assert_eq!(view.current_model().to_mapping(), model.to_mapping());
    }

    #[test]
    fn submission_from_text_view_rejects_broken_text() {
        let mut view = controller(&[("a", "1")]);
        view.switch_to(ViewMode::Text);
        view.set_text("{ nope").expect("text view active");
        assert!(matches!(view.validate_for_submission(), Err(SubmissionError::Parse(_))));
    }
}
