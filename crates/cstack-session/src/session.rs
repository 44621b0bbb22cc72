//! Stack session
//!
//! Owns the loaded stack: steps, selection, clipboard, dirty flag, the object
//! it was loaded from, acknowledgment records, parameter values and the
//! execution engine. Every structural edit marks the session dirty and
//! recomputes heading numbers.

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::storage::ObjectStorage;
use cstack_codec::{
    enrich_steps, object_name_for, CachingLookup, CommandDefinitionLookup, FormatCodec,
    StackFormat,
};
use cstack_engine::{Effect, EngineEvent, ExecutionEngine, StackState};
use cstack_model::{
    number_headings, AdvancementParams, CommandInfo, CommandStep, Step, StepBody, StepKey,
};
use indexmap::IndexSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An open command stack
pub struct StackSession {
    config: SessionConfig,
    codec: FormatCodec,
    storage: Arc<dyn ObjectStorage>,
    lookup: Option<Arc<dyn CommandDefinitionLookup>>,
    state: StackState,
    engine: ExecutionEngine,
    object_name: Option<String>,
    format: StackFormat,
    dirty: bool,
    clipboard: Option<Step>,
    headings: Vec<Option<String>>,
}

impl std::fmt::Debug for StackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackSession")
            .field("object_name", &self.object_name)
            .field("format", &self.format)
            .field("steps", &self.state.steps.len())
            .field("dirty", &self.dirty)
            .field("running", &self.engine.is_running())
            .finish_non_exhaustive()
    }
}

impl StackSession {
    /// Empty session over a storage backend
    #[must_use]
    pub fn new(config: SessionConfig, storage: Arc<dyn ObjectStorage>) -> Self {
        let state = StackState::new(Vec::new(), config.advancement.clone());
        Self {
            codec: FormatCodec::new(config.command_options.clone()),
            config,
            storage,
            lookup: None,
            state,
            engine: ExecutionEngine::new(),
            object_name: None,
            format: StackFormat::Ycs,
            dirty: false,
            clipboard: None,
            headings: Vec::new(),
        }
    }

    /// With a command definition service, cached
    #[must_use]
    pub fn with_lookup(mut self, lookup: Arc<dyn CommandDefinitionLookup>) -> Self {
        let cached = CachingLookup::new(lookup, self.config.definition_cache_capacity);
        self.lookup = Some(Arc::new(cached));
        self
    }

    // ---- accessors ----

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Steps in order
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.state.steps
    }

    /// Stack state shared with the engine
    #[inline]
    #[must_use]
    pub fn state(&self) -> &StackState {
        &self.state
    }

    /// Execution engine
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Selected step
    #[inline]
    #[must_use]
    pub fn selection(&self) -> Option<StepKey> {
        self.state.selection
    }

    /// Position of the selected step
    #[inline]
    #[must_use]
    pub fn selected_index(&self) -> Option<usize> {
        self.state.selected_index()
    }

    /// Unsaved changes
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Format of the loaded object
    #[inline]
    #[must_use]
    pub fn format(&self) -> StackFormat {
        self.format
    }

    /// Name of the loaded object
    #[inline]
    #[must_use]
    pub fn object_name(&self) -> Option<&str> {
        self.object_name.as_deref()
    }

    /// Stack advancement
    #[inline]
    #[must_use]
    pub fn advancement(&self) -> &AdvancementParams {
        &self.state.advancement
    }

    /// Clipboard entry
    #[inline]
    #[must_use]
    pub fn clipboard(&self) -> Option<&Step> {
        self.clipboard.as_ref()
    }

    /// Numbered text of each step; `None` for non-text steps
    #[inline]
    #[must_use]
    pub fn headings(&self) -> &[Option<String>] {
        &self.headings
    }

    /// Parameters referenced by check and verify steps, first use first
    #[must_use]
    pub fn monitored_parameters(&self) -> Vec<String> {
        let names: IndexSet<&str> = self
            .state
            .steps
            .iter()
            .flat_map(Step::parameters)
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    // ---- persistence ----

    /// Load a stack object, replacing the current stack
    ///
    /// Nothing changes unless the whole file parses. A missing XML object
    /// falls back to its YCS sibling. Failed definition lookups are tolerated.
    ///
    /// # Errors
    ///
    /// Storage failures, [`SessionError::NotFound`], encoding and parse errors,
    /// and [`SessionError::RunInProgress`].
    pub async fn load(&mut self, name: &str) -> SessionResult<()> {
        self.ensure_idle()?;
        let mut format = StackFormat::from_object_name(name)?;
        let bucket = self.config.bucket.clone();

        let mut object_name = name.to_string();
        let mut data = self.storage.get_object(&bucket, name).await?;
        if data.is_none() && format == StackFormat::Xml {
            let sibling = object_name_for(name, StackFormat::Ycs);
            debug!(name, sibling = %sibling, "XML stack missing, trying YCS sibling");
            data = self.storage.get_object(&bucket, &sibling).await?;
            if data.is_some() {
                object_name = sibling;
                format = StackFormat::Ycs;
            }
        }
        let data = data.ok_or_else(|| SessionError::NotFound {
            bucket: bucket.clone(),
            name: name.to_string(),
        })?;
        let text =
            String::from_utf8(data).map_err(|_| SessionError::InvalidEncoding(object_name.clone()))?;

        let mut doc = self.codec.parse(&text, format)?;
        if let Some(lookup) = &self.lookup {
            let summary = enrich_steps(&mut doc.steps, format, lookup.as_ref()).await;
            debug!(resolved = summary.resolved, unresolved = summary.unresolved, "Enriched steps");
        }

        let advancement = doc.advancement_or(&self.config.advancement);
        self.state = StackState::new(doc.steps, advancement);
        self.state.select_index(0);
        self.engine = ExecutionEngine::new();
        self.object_name = Some(object_name);
        self.format = format;
        self.dirty = false;
        self.renumber();
        info!(name = ?self.object_name, %format, steps = self.state.steps.len(), "Loaded stack");
        Ok(())
    }

    /// Start a new, unsaved stack under `name`
    ///
    /// # Errors
    ///
    /// [`SessionError::Parse`] when `name` has no stack extension,
    /// [`SessionError::RunInProgress`] during a run.
    pub fn create(&mut self, name: &str) -> SessionResult<()> {
        self.ensure_idle()?;
        let format = StackFormat::from_object_name(name)?;
        self.state = StackState::new(Vec::new(), self.config.advancement.clone());
        self.engine = ExecutionEngine::new();
        self.object_name = Some(name.to_string());
        self.format = format;
        self.dirty = true;
        self.renumber();
        Ok(())
    }

    /// Serialized form of the stack in its own format
    ///
    /// # Errors
    ///
    /// [`SessionError::Serialize`] when a step cannot be written in the format.
    pub fn serialize(&self, format: StackFormat) -> SessionResult<String> {
        Ok(self
            .codec
            .serialize(&self.state.steps, &self.state.advancement, format)?)
    }

    /// Write the stack back to its object
    ///
    /// The dirty flag is cleared only when the write succeeds.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotLoaded`], serialization and storage errors.
    pub async fn save(&mut self) -> SessionResult<()> {
        let name = self.object_name.clone().ok_or(SessionError::NotLoaded)?;
        let text = self.serialize(self.format)?;
        self.storage
            .upload_object(&self.config.bucket, &name, text.into_bytes())
            .await?;
        self.dirty = false;
        info!(name = %name, "Saved stack");
        Ok(())
    }

    /// Rewrite an XML stack as YCS
    ///
    /// Unsaved edits are saved first. The YCS object is written before the
    /// XML object is deleted; after a successful upload the session points at
    /// the YCS object even if the delete fails.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotLoaded`], [`SessionError::AlreadyYcs`],
    /// [`SessionError::RunInProgress`], serialization and storage errors.
    pub async fn convert_to_ycs(&mut self) -> SessionResult<String> {
        self.ensure_idle()?;
        let name = self.object_name.clone().ok_or(SessionError::NotLoaded)?;
        if self.format == StackFormat::Ycs {
            return Err(SessionError::AlreadyYcs);
        }
        if self.dirty {
            self.save().await?;
        }

        let target = object_name_for(&name, StackFormat::Ycs);
        let text = self.serialize(StackFormat::Ycs)?;
        self.storage
            .upload_object(&self.config.bucket, &target, text.into_bytes())
            .await?;
        self.object_name = Some(target.clone());
        self.format = StackFormat::Ycs;
        info!(from = %name, to = %target, "Converted stack to YCS");

        if let Err(err) = self.storage.delete_object(&self.config.bucket, &name).await {
            warn!(name = %name, error = %err, "Converted stack written but original not deleted");
            return Err(err.into());
        }
        Ok(target)
    }

    // ---- selection ----

    /// Select a step
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownStep`] when the step is not in the stack.
    pub fn select(&mut self, key: StepKey) -> SessionResult<()> {
        if self.state.index_of(key).is_none() {
            return Err(SessionError::UnknownStep(key));
        }
        self.state.selection = Some(key);
        Ok(())
    }

    /// Select by position
    ///
    /// # Errors
    ///
    /// [`SessionError::IndexOutOfRange`] past the last step.
    pub fn select_index(&mut self, index: usize) -> SessionResult<()> {
        self.check_index(index)?;
        self.state.select_index(index);
        Ok(())
    }

    /// Clear the selection
    pub fn clear_selection(&mut self) {
        self.state.selection = None;
    }

    // ---- editing ----

    /// Insert after the selected step, or append; the new step is selected
    ///
    /// # Errors
    ///
    /// [`SessionError::RunInProgress`] during a run,
    /// [`SessionError::StepRequiresYcs`] for a non-command step in an XML stack.
    pub fn insert(&mut self, step: Step) -> SessionResult<StepKey> {
        self.ensure_idle()?;
        self.ensure_storable(&step)?;
        let key = step.key();
        let index = self
            .state
            .selected_index()
            .map_or(self.state.steps.len(), |i| i + 1);
        self.state.steps.insert(index, step);
        self.state.selection = Some(key);
        self.touch();
        Ok(key)
    }

    /// Insert a command step for a definition, preferring the configured
    /// alias namespace
    ///
    /// # Errors
    ///
    /// [`SessionError::RunInProgress`] during a run.
    pub fn insert_command(&mut self, info: &CommandInfo) -> SessionResult<StepKey> {
        let command =
            CommandStep::for_definition(info, self.config.preferred_namespace.as_deref());
        let mut step = Step::command(command);
        step.set_command_info(Some(info.clone()));
        self.insert(step)
    }

    /// Replace a step wholesale; the replacement keeps its own key
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownStep`], [`SessionError::RunInProgress`],
    /// [`SessionError::StepRequiresYcs`].
    pub fn replace(&mut self, key: StepKey, step: Step) -> SessionResult<StepKey> {
        self.ensure_idle()?;
        self.ensure_storable(&step)?;
        let index = self
            .state
            .index_of(key)
            .ok_or(SessionError::UnknownStep(key))?;
        let new_key = step.key();
        self.state.steps[index] = step;
        if self.state.selection == Some(key) {
            self.state.selection = Some(new_key);
        }
        self.touch();
        Ok(new_key)
    }

    /// Delete the selected step; nothing is selected afterwards
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSelection`], [`SessionError::RunInProgress`].
    pub fn delete_selected(&mut self) -> SessionResult<Step> {
        self.ensure_idle()?;
        let index = self.state.selected_index().ok_or(SessionError::NoSelection)?;
        let step = self.state.steps.remove(index);
        self.state.selection = None;
        self.touch();
        Ok(step)
    }

    /// Move the selected step to the clipboard; the next step is selected
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSelection`], [`SessionError::RunInProgress`].
    pub fn cut(&mut self) -> SessionResult<()> {
        self.ensure_idle()?;
        let index = self.state.selected_index().ok_or(SessionError::NoSelection)?;
        let key = self.state.steps[index].key();
        self.state.advance_selection(key);
        let step = self.state.steps.remove(index);
        self.clipboard = Some(step);
        self.touch();
        Ok(())
    }

    /// Copy the selected step to the clipboard
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSelection`].
    pub fn copy(&mut self) -> SessionResult<()> {
        let step = self.state.selected().ok_or(SessionError::NoSelection)?;
        self.clipboard = Some(step.clone());
        Ok(())
    }

    /// Insert a fresh copy of the clipboard entry after the selection
    ///
    /// # Errors
    ///
    /// [`SessionError::ClipboardEmpty`], [`SessionError::RunInProgress`],
    /// [`SessionError::StepRequiresYcs`].
    pub fn paste(&mut self) -> SessionResult<StepKey> {
        let step = self
            .clipboard
            .as_ref()
            .ok_or(SessionError::ClipboardEmpty)?
            .duplicate();
        self.insert(step)
    }

    /// Move the step at `from` to position `to`
    ///
    /// # Errors
    ///
    /// [`SessionError::IndexOutOfRange`], [`SessionError::RunInProgress`].
    pub fn reorder(&mut self, from: usize, to: usize) -> SessionResult<()> {
        self.ensure_idle()?;
        self.check_index(from)?;
        self.check_index(to)?;
        if from != to {
            let step = self.state.steps.remove(from);
            self.state.steps.insert(to, step);
            self.touch();
        }
        Ok(())
    }

    /// Set the stack advancement
    ///
    /// # Errors
    ///
    /// [`SessionError::AdvancementRequiresYcs`] for XML stacks.
    pub fn set_advancement(&mut self, advancement: AdvancementParams) -> SessionResult<()> {
        if self.format != StackFormat::Ycs {
            return Err(SessionError::AdvancementRequiresYcs);
        }
        if self.state.advancement != advancement {
            self.state.advancement = advancement;
            self.dirty = true;
        }
        Ok(())
    }

    /// Reset every step's outputs and the execution counter; selects the
    /// first step
    ///
    /// # Errors
    ///
    /// [`SessionError::RunInProgress`] during a run.
    pub fn clear_outputs(&mut self) -> SessionResult<()> {
        self.ensure_idle()?;
        for step in &mut self.state.steps {
            step.clear_outputs();
        }
        self.state.records.clear();
        self.engine.reset_counter();
        self.state.select_index(0);
        Ok(())
    }

    /// Reset the selected step's outputs
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSelection`], [`SessionError::RunInProgress`].
    pub fn clear_selected_outputs(&mut self) -> SessionResult<()> {
        self.ensure_idle()?;
        let index = self.state.selected_index().ok_or(SessionError::NoSelection)?;
        self.state.steps[index].clear_outputs();
        Ok(())
    }

    // ---- running ----

    /// Run the selected step
    ///
    /// # Errors
    ///
    /// [`SessionError::Engine`] when a run is active or nothing is selected.
    pub fn run_selection(&mut self) -> SessionResult<Vec<Effect>> {
        Ok(self.engine.run_selection(&mut self.state)?)
    }

    /// Run from the selected step to the end
    ///
    /// # Errors
    ///
    /// [`SessionError::Engine`] when a run is active or nothing is selected.
    pub fn run_from_selection(&mut self) -> SessionResult<Vec<Effect>> {
        Ok(self.engine.run_from_selection(&mut self.state)?)
    }

    /// Halt the run
    pub fn stop_run(&mut self) -> Vec<Effect> {
        self.engine.stop_run(&mut self.state)
    }

    /// Deliver an engine event
    pub fn handle(&mut self, event: EngineEvent) -> Vec<Effect> {
        self.engine.handle(&mut self.state, event)
    }

    // ---- internals ----

    fn ensure_idle(&self) -> SessionResult<()> {
        if self.engine.is_running() {
            Err(SessionError::RunInProgress)
        } else {
            Ok(())
        }
    }

    fn ensure_storable(&self, step: &Step) -> SessionResult<()> {
        match step.body() {
            StepBody::Command(_) => Ok(()),
            _ if self.format == StackFormat::Ycs => Ok(()),
            _ => Err(SessionError::StepRequiresYcs(step.step_type())),
        }
    }

    fn check_index(&self, index: usize) -> SessionResult<()> {
        let len = self.state.steps.len();
        if index < len {
            Ok(())
        } else {
            Err(SessionError::IndexOutOfRange { index, len })
        }
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.renumber();
    }

    fn renumber(&mut self) {
        self.headings = number_headings(&self.state.steps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, MockObjectStorage};
    use crate::StorageError;
    use cstack_model::StepType;
    use pretty_assertions::assert_eq;

    const BUCKET: &str = "stacks";

    fn session_with(storage: MemoryStorage) -> StackSession {
        StackSession::new(SessionConfig::default(), Arc::new(storage))
    }

    fn texts(session: &StackSession) -> Vec<String> {
        session.steps().iter().map(ToString::to_string).collect()
    }

    async fn loaded(ycs: &str) -> StackSession {
        let storage = MemoryStorage::new().with_object(BUCKET, "a.ycs", ycs);
        let mut session = session_with(storage);
        session.load("a.ycs").await.unwrap();
        session
    }

    const THREE_TEXTS: &str = r##"{"steps": [
        {"type": "text", "text": "# One"},
        {"type": "text", "text": "# Two"},
        {"type": "text", "text": "# Three"}
    ]}"##;

    #[tokio::test]
    async fn load_selects_first_step_and_numbers_headings() {
        let session = loaded(THREE_TEXTS).await;
        assert_eq!(session.selected_index(), Some(0));
        assert!(!session.is_dirty());
        assert_eq!(session.headings()[2].as_deref(), Some("# 3 Three"));
    }

    #[tokio::test]
    async fn failed_parse_keeps_previous_stack() {
        let storage = MemoryStorage::new()
            .with_object(BUCKET, "good.ycs", THREE_TEXTS)
            .with_object(BUCKET, "bad.ycs", r#"{"steps": [{"type": "wait"}]}"#);
        let mut session = session_with(storage);
        session.load("good.ycs").await.unwrap();

        assert!(session.load("bad.ycs").await.is_err());
        assert_eq!(session.steps().len(), 3);
        assert_eq!(session.object_name(), Some("good.ycs"));
    }

    #[tokio::test]
    async fn missing_xml_falls_back_to_ycs() {
        let storage = MemoryStorage::new().with_object(BUCKET, "pass.ycs", THREE_TEXTS);
        let mut session = session_with(storage);
        session.load("pass.xml").await.unwrap();
        assert_eq!(session.object_name(), Some("pass.ycs"));
        assert_eq!(session.format(), StackFormat::Ycs);

        let err = session.load("other.xml").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn insert_goes_after_selection_and_renumbers() {
        let mut session = loaded(THREE_TEXTS).await;
        let key = session.insert(Step::text("# Inserted")).unwrap();

        assert_eq!(session.selection(), Some(key));
        assert_eq!(session.selected_index(), Some(1));
        assert!(session.is_dirty());
        assert_eq!(session.headings()[1].as_deref(), Some("# 2 Inserted"));
        assert_eq!(session.headings()[3].as_deref(), Some("# 4 Three"));
    }

    #[tokio::test]
    async fn insert_without_selection_appends() {
        let mut session = loaded(THREE_TEXTS).await;
        session.clear_selection();
        session.insert(Step::text("last")).unwrap();
        assert_eq!(session.selected_index(), Some(3));
    }

    #[tokio::test]
    async fn cut_advances_selection_and_paste_inserts_copy() {
        let mut session = loaded(THREE_TEXTS).await;
        let cut_key = session.steps()[0].key();
        session.cut().unwrap();

        assert_eq!(texts(&session), vec!["# Two", "# Three"]);
        assert_eq!(session.selected_index(), Some(0));

        let pasted = session.paste().unwrap();
        assert_ne!(pasted, cut_key);
        assert_eq!(texts(&session), vec!["# Two", "# One", "# Three"]);
        assert_eq!(session.selection(), Some(pasted));

        let again = session.paste().unwrap();
        assert_ne!(again, pasted);
        assert_eq!(session.steps().len(), 4);
    }

    #[tokio::test]
    async fn cut_of_last_step_clears_selection() {
        let mut session = loaded(THREE_TEXTS).await;
        session.select_index(2).unwrap();
        session.cut().unwrap();
        assert_eq!(session.selection(), None);
    }

    #[tokio::test]
    async fn copy_keeps_stack_clean() {
        let mut session = loaded(THREE_TEXTS).await;
        session.copy().unwrap();
        assert!(!session.is_dirty());
        assert_eq!(session.clipboard().map(ToString::to_string).as_deref(), Some("# One"));
    }

    #[tokio::test]
    async fn paste_requires_clipboard() {
        let mut session = loaded(THREE_TEXTS).await;
        assert!(matches!(session.paste(), Err(SessionError::ClipboardEmpty)));
    }

    #[tokio::test]
    async fn delete_clears_selection() {
        let mut session = loaded(THREE_TEXTS).await;
        let removed = session.delete_selected().unwrap();
        assert_eq!(removed.to_string(), "# One");
        assert_eq!(session.selection(), None);
        assert_eq!(session.headings()[0].as_deref(), Some("# 1 Two"));
        assert!(matches!(session.delete_selected(), Err(SessionError::NoSelection)));
    }

    #[tokio::test]
    async fn reorder_moves_step() {
        let mut session = loaded(THREE_TEXTS).await;
        session.reorder(2, 0).unwrap();
        assert_eq!(texts(&session), vec!["# Three", "# One", "# Two"]);
        assert_eq!(session.headings()[0].as_deref(), Some("# 1 Three"));
        assert!(matches!(
            session.reorder(0, 3),
            Err(SessionError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[tokio::test]
    async fn replace_swaps_step_and_selection() {
        let mut session = loaded(THREE_TEXTS).await;
        let old = session.steps()[0].key();
        let new = session.replace(old, Step::text("## Sub")).unwrap();
        assert_eq!(session.selection(), Some(new));
        assert_eq!(session.headings()[0].as_deref(), Some("## 0.1 Sub"));
        assert!(matches!(
            session.replace(old, Step::text("x")),
            Err(SessionError::UnknownStep(_))
        ));
    }

    #[tokio::test]
    async fn advancement_is_ycs_only() {
        let storage = MemoryStorage::new()
            .with_object(BUCKET, "a.xml", "<commandStack/>")
            .with_object(BUCKET, "b.ycs", "{}");
        let mut session = session_with(storage);

        session.load("a.xml").await.unwrap();
        let adv = AdvancementParams::new("Acknowledge_Sent", 10);
        assert!(matches!(
            session.set_advancement(adv.clone()),
            Err(SessionError::AdvancementRequiresYcs)
        ));

        session.load("b.ycs").await.unwrap();
        session.set_advancement(adv.clone()).unwrap();
        assert!(session.is_dirty());
        assert_eq!(session.advancement(), &adv);
    }

    #[tokio::test]
    async fn xml_stack_accepts_only_command_steps() {
        let storage = Arc::new(MemoryStorage::new().with_object(
            BUCKET,
            "p.xml",
            "<commandStack><command qualifiedName=\"/A\"/></commandStack>",
        ));
        let mut session = StackSession::new(SessionConfig::default(), storage.clone());
        session.load("p.xml").await.unwrap();
        let first = session.steps()[0].key();

        assert!(matches!(
            session.insert(Step::text("# Notes")),
            Err(SessionError::StepRequiresYcs(StepType::Text))
        ));
        assert!(matches!(
            session.replace(first, Step::text("# Notes")),
            Err(SessionError::StepRequiresYcs(StepType::Text))
        ));
        assert!(!session.is_dirty());

        session.insert(Step::command(CommandStep::new("/B"))).unwrap();
        session.save().await.unwrap();
        assert_eq!(storage.names(BUCKET), vec!["p.xml"]);
        assert_eq!(session.steps().len(), 2);
    }

    #[tokio::test]
    async fn failed_save_stays_dirty() {
        let mut storage = MockObjectStorage::new();
        storage
            .expect_get_object()
            .returning(|_, _| Ok(Some(THREE_TEXTS.as_bytes().to_vec())));
        let mut attempts = 0;
        storage.expect_upload_object().times(2).returning(move |_, _, _| {
            attempts += 1;
            if attempts == 1 {
                Err(StorageError::backend("disk full"))
            } else {
                Ok(())
            }
        });

        let mut session = StackSession::new(SessionConfig::default(), Arc::new(storage));
        session.load("a.ycs").await.unwrap();
        session.insert(Step::text("more")).unwrap();

        assert!(session.save().await.is_err());
        assert!(session.is_dirty());
        session.insert(Step::text("still editable")).unwrap();

        session.save().await.unwrap();
        assert!(!session.is_dirty());
    }

    #[tokio::test]
    async fn conversion_keeps_xml_when_upload_fails() {
        let mut storage = MockObjectStorage::new();
        storage.expect_get_object().returning(|_, _| {
            Ok(Some(b"<commandStack><command qualifiedName=\"/A\"/></commandStack>".to_vec()))
        });
        storage
            .expect_upload_object()
            .returning(|_, _, _| Err(StorageError::backend("unavailable")));
        storage.expect_delete_object().never();

        let mut session = StackSession::new(SessionConfig::default(), Arc::new(storage));
        session.load("pass.xml").await.unwrap();

        assert!(session.convert_to_ycs().await.is_err());
        assert_eq!(session.object_name(), Some("pass.xml"));
        assert_eq!(session.format(), StackFormat::Xml);
    }

    #[tokio::test]
    async fn clear_outputs_resets_counter_and_selection() {
        let mut session = loaded(THREE_TEXTS).await;
        session.select_index(1).unwrap();
        session.run_selection().unwrap();
        session.stop_run();
        assert_eq!(session.engine().execution_counter(), 1);
        assert!(session.steps()[1].output().has_outputs());

        session.clear_outputs().unwrap();
        assert_eq!(session.engine().execution_counter(), 0);
        assert!(session.steps().iter().all(|s| !s.output().has_outputs()));
        assert_eq!(session.selected_index(), Some(0));
        assert!(!session.is_dirty());
    }

    #[tokio::test]
    async fn edits_are_refused_during_a_run() {
        let mut session = loaded(THREE_TEXTS).await;
        session.run_from_selection().unwrap();
        assert!(matches!(
            session.insert(Step::text("x")),
            Err(SessionError::RunInProgress)
        ));
        session.stop_run();
        session.insert(Step::text("x")).unwrap();
    }

    #[tokio::test]
    async fn monitored_parameters_are_deduplicated() {
        let session = loaded(
            r#"{"steps": [
                {"type": "check", "parameters": [{"parameter": "/A"}, {"parameter": "/B"}]},
                {"type": "verify", "condition": [{"parameter": "/B", "operator": "eq", "value": 1},
                                                 {"parameter": "/C", "operator": "gt", "value": 0}]}
            ]}"#,
        )
        .await;
        assert_eq!(session.monitored_parameters(), vec!["/A", "/B", "/C"]);
    }

    #[test]
    fn insert_command_prefers_alias() {
        let config = SessionConfig::default().with_preferred_namespace("MDB:OPS Name");
        let mut session = StackSession::new(config, Arc::new(MemoryStorage::new()));
        session.create("new.ycs").unwrap();

        let info = CommandInfo::new("/YSS/SIMULATOR/SWITCH_VOLTAGE_ON")
            .with_alias("MDB:OPS Name", "SWITCH_VOLTAGE_ON");
        session.insert_command(&info).unwrap();

        let cmd = session.steps()[0].as_command().unwrap();
        assert_eq!(cmd.name, "SWITCH_VOLTAGE_ON");
        assert_eq!(cmd.namespace.as_deref(), Some("MDB:OPS Name"));
        assert!(session.steps()[0].command_info().is_some());
    }
}
