//! Editing session for one template set
//!
//! An [`EditorSession`] lives from the moment the template editor opens
//! until it closes. It owns the highlighter, the pair matcher, the cursor
//! store and the timers, and the host forwards its events to the hook
//! methods below. Anything that fails inside a hook is logged, counted
//! and shown to the user as a notice; it never propagates out.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};
use tracing::{debug, error, info};

use crate::clipboard::simplify_html;
use crate::complete::Completer;
use crate::config::Config;
use crate::cursor_store::{CursorStore, PositionRecord, ProfileStore};
use crate::edit::{self, Edit};
use crate::error::{Error, Result};
use crate::external::{self, ExternalEditor, Staleness, Target};
use crate::host::{EditorHost, Pane, Selection};
use crate::pairs::{PairHighlighter, PairResult};
use crate::scheduler::{Debounce, Interval, Staged};
use crate::search::{self, FindHistory, FindOptions, Finder, SearchDirection};
use crate::syntax::{DocumentHighlighter, LineHighlighter};

/// Delays of the cursor restore after a slot or pane switch
const RESTORE_DELAYS_MS: [u64; 5] = [50, 75, 100, 125, 150];
/// Delays of the cursor restore after a history jump
const HISTORY_DELAYS_MS: [u64; 5] = [40, 60, 70, 85, 100];

/// One step of a staged cursor restore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestoreStep {
    SetAnchor,
    SetEnd,
    Apply,
    Scroll,
    Focus,
}

fn restore_plan(delays: [u64; 5]) -> Staged<RestoreStep> {
    let steps = [
        RestoreStep::SetAnchor,
        RestoreStep::SetEnd,
        RestoreStep::Apply,
        RestoreStep::Scroll,
        RestoreStep::Focus,
    ];
    Staged::new(
        delays
            .iter()
            .zip(steps)
            .map(|(&ms, step)| (Duration::from_millis(ms), step))
            .collect(),
    )
}

fn line_of(text: &str, offset: usize) -> usize {
    text.as_bytes()[..offset.min(text.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
}

/// State of an open template editor
pub struct EditorSession {
    config: Config,
    highlighter: DocumentHighlighter,
    pairs: PairHighlighter,
    cursors: CursorStore,
    completer: Completer,
    external: Option<ExternalEditor>,
    find_history: FindHistory,
    last_find: Option<Finder>,
    set_name: String,
    template_name: String,
    slot: usize,
    pane: Pane,
    pair_timer: Debounce,
    poll: Interval,
    /// Poll was stopped because the host blocked its signals
    poll_held: bool,
    restore: Staged<RestoreStep>,
    history_restore: Staged<RestoreStep>,
    /// Record being applied by the staged restore
    pending: PositionRecord,
    /// Selection built up by the restore steps before it is applied
    working: Selection,
    errors: usize,
    open: bool,
}

impl EditorSession {
    /// Start a session for `set_name` with `slot_count` card templates
    pub fn open(config: Config, set_name: &str, slot_count: usize, store: Box<dyn ProfileStore>) -> Self {
        let theme = config.build_theme();
        let pairs = PairHighlighter::new(theme.paired);
        let highlighter = LineHighlighter::new(theme).with_scan_limit(config.scan_limit);
        let external = ExternalEditor::from_config(&config);
        info!(set = set_name, slots = slot_count, "editor session opened");

        Self {
            highlighter: DocumentHighlighter::new(highlighter),
            pairs,
            cursors: CursorStore::open(set_name, slot_count, store),
            completer: Completer::new(&config.template_code),
            external,
            find_history: FindHistory::new(),
            last_find: None,
            set_name: set_name.to_string(),
            template_name: format!("{}_card1", set_name),
            slot: 0,
            pane: Pane::Front,
            pair_timer: Debounce::new(config.pair_debounce()),
            poll: Interval::new(config.external_poll()),
            poll_held: false,
            restore: restore_plan(RESTORE_DELAYS_MS),
            history_restore: restore_plan(HISTORY_DELAYS_MS),
            pending: PositionRecord::default(),
            working: Selection::default(),
            errors: 0,
            open: true,
            config,
        }
    }

    /// Use `editor` for round trips instead of the configured one
    pub fn with_external(mut self, editor: ExternalEditor) -> Self {
        self.external = Some(editor);
        self
    }

    /// Stop timers and write the cursor positions out
    pub fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.pair_timer.cancel();
        self.poll.stop();
        self.restore.cancel();
        self.history_restore.cancel();
        info!(set = %self.set_name, errors = self.errors, "editor session closed");
        self.cursors.persist()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn pane(&self) -> Pane {
        self.pane
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    pub fn cursors(&self) -> &CursorStore {
        &self.cursors
    }

    pub fn highlighter(&self) -> &DocumentHighlighter {
        &self.highlighter
    }

    pub fn find_history(&self) -> &FindHistory {
        &self.find_history
    }

    /// Errors caught in hooks so far
    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_running()
    }

    pub fn is_restoring(&self) -> bool {
        self.restore.is_running() || self.history_restore.is_running()
    }

    fn target(&self) -> Target<'_> {
        Target {
            set_name: &self.set_name,
            template_name: &self.template_name,
            pane: self.pane,
        }
    }

    fn report<H: EditorHost + ?Sized>(&mut self, host: &mut H, err: &Error) {
        self.errors += 1;
        error!(count = self.errors, error = %err, "editor hook failed");
        host.show_notice(&format!("{} errors, last one: {}", self.errors, err));
    }

    /// Highlight the whole document and restore the saved cursor
    pub fn show<H: EditorHost + ?Sized>(&mut self, host: &mut H, now: Instant) {
        self.highlight_document(host);
        self.begin_restore(now);
        self.poll.start(now);
    }

    /// Editor hidden; stop the external-file poll
    pub fn hide(&mut self) {
        self.poll.stop();
        self.pair_timer.cancel();
    }

    fn highlight_document<H: EditorHost + ?Sized>(&mut self, host: &mut H) {
        let text = host.text();
        self.highlighter.highlight_all(&text);
        self.paint_lines(host, 0..self.highlighter.line_count());
    }

    fn paint_lines<H: EditorHost + ?Sized>(&self, host: &mut H, lines: std::ops::Range<usize>) {
        for line in lines {
            host.paint_line(line, self.highlighter.spans(line));
        }
    }

    fn save_position<H: EditorHost + ?Sized>(&mut self, host: &mut H) {
        let saved = self.cursors.save(
            self.slot,
            self.pane,
            host.selection(),
            host.vertical_scroll(),
            host.has_focus(),
        );
        if let Err(e) = saved {
            self.report(host, &e);
        }
    }

    fn begin_restore(&mut self, now: Instant) {
        self.pending = self.cursors.restore(self.slot, self.pane);
        self.history_restore.cancel();
        self.restore.start(now);
    }

    fn begin_history_restore(&mut self, record: PositionRecord, now: Instant) {
        self.pending = record;
        self.restore.cancel();
        self.history_restore.start(now);
    }

    fn apply_step<H: EditorHost + ?Sized>(&mut self, host: &mut H, step: RestoreStep) {
        match step {
            RestoreStep::SetAnchor => self.working = Selection::cursor(self.pending.cursor_position),
            RestoreStep::SetEnd => self.working.position = self.pending.cursor_position_end,
            RestoreStep::Apply => host.set_selection(self.working),
            RestoreStep::Scroll => host.set_vertical_scroll(self.pending.vertical_scroll),
            RestoreStep::Focus => host.set_focus(),
        }
    }

    /// The host is about to show another card template
    pub fn before_slot_change<H: EditorHost + ?Sized>(&mut self, host: &mut H) {
        if host.signals_blocked() {
            return;
        }
        self.save_position(host);
    }

    /// The host now shows card template `slot`, named `template_name`
    pub fn after_slot_change<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        slot: usize,
        template_name: &str,
        now: Instant,
    ) {
        self.slot = slot;
        self.template_name = template_name.to_string();
        debug!(slot, template = template_name, "slot changed");
        self.highlight_document(host);
        self.begin_restore(now);
        self.check_external(host);
    }

    /// The host switched between the front, back and style panes
    pub fn pane_switched<H: EditorHost + ?Sized>(&mut self, host: &mut H, pane: Pane, now: Instant) {
        if pane == self.pane {
            return;
        }
        self.poll.stop();
        self.save_position(host);
        self.pane = pane;
        self.highlight_document(host);
        self.begin_restore(now);
        self.poll.start(now);
    }

    /// Card template `index` was deleted
    pub fn slot_removed(&mut self, index: usize) {
        self.cursors.remove_slot(index);
        if self.slot > index {
            self.slot -= 1;
        }
        self.slot = self.slot.min(self.cursors.slot_count().saturating_sub(1));
    }

    /// A card template was appended; returns its index
    pub fn slot_added(&mut self) -> usize {
        self.cursors.add_slot()
    }

    /// Two card templates traded places
    pub fn slots_swapped(&mut self, a: usize, b: usize) {
        self.cursors.swap_slots(a, b);
        if self.slot == a {
            self.slot = b;
        } else if self.slot == b {
            self.slot = a;
        }
    }

    /// Cursor moved or selection changed
    pub fn selection_changed<H: EditorHost + ?Sized>(&mut self, host: &mut H, now: Instant) {
        if self.is_restoring() {
            return;
        }
        self.pair_timer.schedule(now);
        self.save_position(host);
    }

    /// Lines `first..=last` of the host text were edited
    pub fn text_changed<H: EditorHost + ?Sized>(&mut self, host: &mut H, first: usize, last: usize) {
        let text = host.text();
        let lines = self.highlighter.lines_changed(&text, first, last);
        self.paint_lines(host, lines);
    }

    /// Timer tick from the host's event loop
    pub fn tick<H: EditorHost + ?Sized>(&mut self, host: &mut H, now: Instant) {
        if !self.open {
            return;
        }
        let mut steps = self.restore.poll(now);
        steps.extend(self.history_restore.poll(now));
        for step in steps {
            self.apply_step(host, step);
        }

        if self.pair_timer.fire(now) {
            self.highlight_pair(host);
        }

        if host.signals_blocked() {
            if self.poll.is_running() {
                self.poll.stop();
                self.poll_held = true;
            }
            return;
        }
        if self.poll_held {
            self.poll_held = false;
            self.poll.start(now);
        }
        if self.poll.fire(now) {
            self.check_external(host);
        }
    }

    /// Match the bracket or tag at the host's selection right away
    pub fn highlight_pair<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> Option<PairResult> {
        self.pair_timer.cancel();
        self.pairs.apply(host)
    }

    /// Re-highlight everything, flagging every occurrence of the selection
    pub fn rehighlight_all<H: EditorHost + ?Sized>(&mut self, host: &mut H) {
        let text = host.text();
        let target = text
            .get(host.selection().range())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        self.highlighter.rehighlight_all(&text, target);
        self.paint_lines(host, 0..self.highlighter.line_count());
    }

    /// Switch syntax highlighting on or off and repaint
    pub fn toggle_highlighting<H: EditorHost + ?Sized>(&mut self, host: &mut H) {
        self.highlighter.toggle();
        self.highlight_document(host);
    }

    /// Remember the current location for history jumps
    pub fn save_history_point<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        self.cursors.save_unique(
            self.slot,
            self.pane,
            host.selection(),
            host.vertical_scroll(),
            host.has_focus(),
        )
    }

    /// Jump to an older location
    pub fn history_back(&mut self, now: Instant) {
        let record = self.cursors.history_back(self.slot, self.pane);
        self.begin_history_restore(record, now);
    }

    /// Jump to a newer location
    pub fn history_forward(&mut self, now: Instant) {
        let record = self.cursors.history_forward(self.slot, self.pane);
        self.begin_history_restore(record, now);
    }

    /// Search for `needle` from the selection and select the match
    pub fn find<H: EditorHost + ?Sized>(&mut self, host: &mut H, needle: &str, opts: FindOptions) -> bool {
        let finder = match Finder::new(needle, opts) {
            Ok(f) => f,
            Err(e) => {
                host.show_notice(&e.to_string());
                return false;
            }
        };
        self.find_history.add(needle);
        self.last_find = Some(finder.clone());
        self.find_with(host, &finder)
    }

    /// Repeat the last search forward
    pub fn find_next<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        self.repeat_find(host, SearchDirection::Forward)
    }

    /// Repeat the last search backward
    pub fn find_previous<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        self.repeat_find(host, SearchDirection::Backward)
    }

    fn repeat_find<H: EditorHost + ?Sized>(&mut self, host: &mut H, direction: SearchDirection) -> bool {
        let Some(finder) = self.last_find.as_ref().map(|f| f.with_direction(direction)) else {
            host.show_notice("No search string");
            return false;
        };
        self.find_with(host, &finder)
    }

    fn find_with<H: EditorHost + ?Sized>(&mut self, host: &mut H, finder: &Finder) -> bool {
        let text = host.text();
        let selection = host.selection();
        let from = match finder.options().direction {
            SearchDirection::Forward => selection.end(),
            SearchDirection::Backward => selection.start(),
        };
        match finder.find_wrapping(&text, from) {
            Some((found, wrapped)) => {
                if wrapped {
                    host.show_notice("Wrapped");
                }
                host.set_selection(Selection::new(found.start, found.end));
                true
            }
            None => {
                host.show_notice("No matches found.");
                false
            }
        }
    }

    /// Replace the selection if it is a match, then find the next one
    pub fn replace_one<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        needle: &str,
        replacement: &str,
        opts: FindOptions,
    ) -> bool {
        let finder = match Finder::new(needle, opts.forward()) {
            Ok(f) => f,
            Err(e) => {
                host.show_notice(&e.to_string());
                return false;
            }
        };
        let text = host.text();
        let selection = host.selection();
        let selected = selection.range();
        if !selection.is_empty() && finder.matches_in(&text, selected.clone()) == [selected.clone()] {
            let (new_text, end) = search::replace_range(&text, selected.clone(), replacement);
            host.set_text(&new_text);
            host.set_selection(Selection::cursor(end));
            let first = line_of(&new_text, selected.start);
            self.text_changed(host, first, line_of(&new_text, end));
        }
        self.find(host, needle, opts)
    }

    /// Replace every match, inside the selection when `in_selection`
    pub fn replace_all<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        needle: &str,
        replacement: &str,
        opts: FindOptions,
        in_selection: bool,
    ) -> usize {
        let text = host.text();
        let selection = host.selection();
        let within = (in_selection && !selection.is_empty()).then(|| selection.range());
        let (new_text, count) = match search::replace_all(&text, needle, replacement, opts, within) {
            Ok(done) => done,
            Err(e) => {
                host.show_notice(&e.to_string());
                return 0;
            }
        };
        self.find_history.add(needle);
        if count > 0 {
            host.set_text(&new_text);
            self.highlight_document(host);
        }
        host.show_notice(&format!("Replaced: {}", count));
        count
    }

    /// Select the next `%%` placeholder
    pub fn next_cloze<H: EditorHost + ?Sized>(&mut self, host: &mut H, direction: SearchDirection) -> bool {
        let text = host.text();
        let cursor = match direction {
            SearchDirection::Forward => host.selection().end(),
            SearchDirection::Backward => host.selection().start(),
        };
        match search::next_cloze_marker(&text, cursor, direction) {
            Some(found) => {
                host.set_selection(Selection::new(found.start, found.end));
                true
            }
            None => false,
        }
    }

    /// Completion candidates for the word before the cursor
    pub fn completions<H: EditorHost + ?Sized>(&mut self, host: &H) -> Vec<String> {
        let text = host.text();
        self.completer.harvest(&text);
        self.completer
            .candidates_at(&text, host.selection().position)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Insert a chosen completion
    pub fn accept_completion<H: EditorHost + ?Sized>(&mut self, host: &mut H, item: &str) {
        let text = host.text();
        let selection = host.selection();
        let selected = text.get(selection.range()).unwrap_or("").to_string();
        let first = line_of(&text, selection.start());
        let done = self.completer.accept(&text, selection.position, item, &selected);
        let done = Edit {
            text: done.text,
            selection: done.selection,
        };
        self.apply_edit(host, first, done);
    }

    /// Insert clipboard text over the selection
    pub fn paste<H: EditorHost + ?Sized>(&mut self, host: &mut H, clipboard: &str) {
        let inserted = if self.config.replace_tabs_on_paste {
            clipboard.replace('\t', "    ")
        } else {
            clipboard.to_string()
        };
        self.insert_over_selection(host, &inserted);
    }

    /// Paste the clipboard's HTML reduced to simple markup
    ///
    /// Without HTML on the clipboard the plain text goes in as it is.
    pub fn paste_simplified_html<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        html: &str,
        plain: &str,
        keep_colors: bool,
    ) {
        if html.is_empty() {
            self.insert_over_selection(host, plain);
        } else {
            self.insert_over_selection(host, &simplify_html(html, keep_colors));
        }
    }

    fn insert_over_selection<H: EditorHost + ?Sized>(&mut self, host: &mut H, inserted: &str) {
        let text = host.text();
        let range = host.selection().range();
        let first = line_of(&text, range.start);
        let (new_text, end) = search::replace_range(&text, range, inserted);
        host.set_text(&new_text);
        host.set_selection(Selection::cursor(end));
        self.text_changed(host, first, line_of(&new_text, end));
    }

    fn apply_edit<H: EditorHost + ?Sized>(&mut self, host: &mut H, first: usize, done: Edit) {
        host.set_text(&done.text);
        host.set_selection(done.selection);
        let last = line_of(&done.text, done.selection.end());
        self.text_changed(host, first, last);
    }

    /// Wrap the selection in `prefix`/`suffix`, or unwrap it if it is
    /// wrapped already; false without a selection
    pub fn toggle_wrap<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        prefix: &str,
        suffix: &str,
        add_space: bool,
    ) -> bool {
        let text = host.text();
        let selection = host.selection();
        let Some(done) = edit::toggle_wrap(&text, selection, prefix, suffix, add_space) else {
            return false;
        };
        let first = line_of(&text, selection.start().saturating_sub(prefix.len()));
        self.apply_edit(host, first, done);
        true
    }

    /// Enter key; false when the host should insert a plain newline
    pub fn enter<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        let text = host.text();
        let selection = host.selection();
        let Some(done) = edit::enter_with_indent(&text, selection) else {
            return false;
        };
        let first = line_of(&text, selection.position);
        self.apply_edit(host, first, done);
        true
    }

    /// Home key, extending the selection with `extend`
    pub fn home<H: EditorHost + ?Sized>(&mut self, host: &mut H, extend: bool) {
        let text = host.text();
        host.set_selection(edit::home(&text, host.selection(), extend));
    }

    /// End key, extending the selection with `extend`
    pub fn end<H: EditorHost + ?Sized>(&mut self, host: &mut H, extend: bool) {
        let text = host.text();
        host.set_selection(edit::end(&text, host.selection(), extend));
    }

    fn local_now() -> NaiveDateTime {
        Local::now().naive_local()
    }

    /// Write the pane to its round-trip file and launch the external editor
    pub fn open_external<H: EditorHost + ?Sized>(&mut self, host: &mut H, now: Instant) {
        let Some(editor) = self.external.clone() else {
            host.show_notice("No home directory for round-trip files");
            return;
        };
        let text = host.text();
        let cursor = host.selection().position;
        let (opened, launched) = editor.open(&text, cursor, &self.target(), Self::local_now());

        if let Some(opened) = opened {
            host.set_text(&opened.stamped.text);
            host.set_selection(Selection::cursor(opened.stamped.cursor));
            self.highlight_document(host);
            self.poll.start(now);
        }
        match launched {
            Ok(()) => host.show_notice("Please wait. Opening external code editor."),
            Err(e) => self.report(host, &e),
        }
    }

    /// Compare the pane with its round-trip file; warns when it changed
    pub fn check_external<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> Staleness {
        let Some(editor) = &self.external else {
            return Staleness::Missing;
        };
        let staleness = editor.check_staleness(&host.text(), &self.target());
        if staleness == Staleness::Modified {
            host.show_notice("Update from external file or cancel by saving");
        }
        staleness
    }

    /// Load the round-trip file if it was changed outside the editor
    pub fn update_from_external<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        let Some(editor) = self.external.clone() else {
            return false;
        };
        let path = editor.file_path(&self.target());
        match editor.check_staleness(&host.text(), &self.target()) {
            Staleness::Modified => {}
            Staleness::Fresh => {
                host.show_notice("File has not been modified.");
                return false;
            }
            Staleness::Missing => {
                host.show_notice(&Error::FileNotFound(path).to_string());
                return false;
            }
            Staleness::NoSentinel => {
                host.show_notice(&Error::MissingSentinel(path).to_string());
                return false;
            }
        }

        let text = host.text();
        let cursor = host.selection().position;
        match external::reload_from_file(&text, cursor, &path, self.pane, Self::local_now()) {
            Ok(stamped) => {
                host.set_text(&stamped.text);
                host.set_selection(Selection::cursor(stamped.cursor));
                self.highlight_document(host);
                host.show_notice("Editor updated from external file.");
                true
            }
            Err(e) => {
                self.report(host, &e);
                false
            }
        }
    }

    /// Write a timestamped backup, and the round-trip file if the pane
    /// carries a sentinel
    pub fn save_with_backup<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        let Some(editor) = self.external.clone() else {
            host.show_notice("No home directory for backups");
            return false;
        };
        let text = host.text();
        let cursor = host.selection().position;
        match editor.save_with_backup(&text, cursor, &self.target(), Self::local_now()) {
            Ok(saved) => {
                if let Some(main) = &saved.main {
                    host.set_text(&saved.stamped.text);
                    host.set_selection(Selection::cursor(saved.stamped.cursor));
                    self.highlight_document(host);
                    host.show_notice(&format!(
                        "Saved backup: {}\nFile: {}",
                        saved.backup.display(),
                        main.display()
                    ));
                } else {
                    host.show_notice(&format!("Saved backup: {}", saved.backup.display()));
                }
                true
            }
            Err(e) => {
                self.report(host, &e);
                false
            }
        }
    }

    /// Replace the pane with the contents of `path`
    pub fn load_file<H: EditorHost + ?Sized>(&mut self, host: &mut H, path: &Path) -> bool {
        match external::load_file(path) {
            Ok(contents) => {
                host.set_text(&contents);
                host.set_selection(Selection::cursor(0));
                self.highlight_document(host);
                host.show_notice(&format!("Loaded file: '{}'", path.display()));
                true
            }
            Err(e @ Error::FileNotFound(_)) => {
                host.show_notice(&e.to_string());
                false
            }
            Err(e) => {
                self.report(host, &e);
                false
            }
        }
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(error = %e, "failed to save cursor positions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor_store::MemoryProfileStore;
    use crate::host::BufferHost;

    const MS: Duration = Duration::from_millis(1);

    fn session() -> EditorSession {
        EditorSession::open(Config::default(), "Basic", 2, Box::new(MemoryProfileStore::default()))
    }

    fn session_with_root(root: &Path, command: &str) -> EditorSession {
        session().with_external(ExternalEditor::new(root, command))
    }

    #[test]
    fn test_show_paints_every_line() {
        let mut s = session();
        let mut host = BufferHost::new("<div>\n/* a\nb */\n</div>");
        s.show(&mut host, Instant::now());
        let lines: Vec<usize> = host.painted.iter().map(|(line, _)| *line).collect();
        assert_eq!(lines, vec![0, 1, 2, 3]);
        assert!(s.is_polling());
    }

    #[test]
    fn test_text_change_propagates_block_state() {
        let mut s = session();
        let mut host = BufferHost::new("a\nb\nc\nd");
        s.show(&mut host, Instant::now());
        host.painted.clear();

        host.text = "/* a\nb\nc\nd".to_string();
        s.text_changed(&mut host, 0, 0);
        let lines: Vec<usize> = host.painted.iter().map(|(line, _)| *line).collect();
        assert_eq!(lines, vec![0, 1, 2, 3]);
        assert!(s.highlighter().end_state(3).is_inside_block());
    }

    #[test]
    fn test_pair_highlight_is_debounced() {
        let t0 = Instant::now();
        let mut s = session();
        let mut host = BufferHost::new("{ (x) }");
        host.selection = Selection::cursor(2);
        s.selection_changed(&mut host, t0);
        s.tick(&mut host, t0 + 50 * MS);
        assert!(host.extra.is_empty());

        s.tick(&mut host, t0 + 100 * MS);
        assert_eq!(host.extra.len(), 1);
        assert_eq!(host.extra[0].0, 4..5);

        host.selection = Selection::cursor(3);
        s.selection_changed(&mut host, t0 + 200 * MS);
        s.tick(&mut host, t0 + 300 * MS);
        assert!(host.extra.is_empty());
    }

    #[test]
    fn test_slot_switch_restores_in_stages() {
        let t0 = Instant::now();
        let mut s = session();
        let text = "0123456789\n".repeat(20);
        let mut host = BufferHost::new(&text);

        host.selection = Selection::new(5, 9);
        host.scroll = 3;
        s.before_slot_change(&mut host);
        s.after_slot_change(&mut host, 1, "Basic_card2", t0);
        assert_eq!(s.slot(), 1);

        host.selection = Selection::new(40, 44);
        host.scroll = 7;
        s.before_slot_change(&mut host);
        s.after_slot_change(&mut host, 0, "Basic_card1", t0 + 200 * MS);

        host.selection = Selection::cursor(0);
        host.scroll = 0;
        host.focused = false;
        s.tick(&mut host, t0 + 260 * MS);
        assert_eq!(host.selection, Selection::cursor(0));
        s.tick(&mut host, t0 + 300 * MS);
        assert_eq!(host.selection, Selection::new(5, 9));
        assert_eq!(host.scroll, 0);
        s.tick(&mut host, t0 + 350 * MS);
        assert_eq!(host.scroll, 3);
        assert!(host.focused);
        assert!(!s.is_restoring());
    }

    #[test]
    fn test_unfocused_position_not_saved() {
        let mut s = session();
        let mut host = BufferHost::new("abcdef");
        host.focused = false;
        host.selection = Selection::cursor(4);
        s.before_slot_change(&mut host);
        assert_eq!(s.cursors().get(0, Pane::Front).map(|p| p.current.cursor_position), Some(0));
    }

    #[test]
    fn test_poll_held_while_signals_blocked() {
        let t0 = Instant::now();
        let mut s = session();
        let mut host = BufferHost::new("x");
        s.show(&mut host, t0);

        host.blocked = true;
        s.tick(&mut host, t0 + MS);
        assert!(!s.is_polling());

        host.blocked = false;
        s.tick(&mut host, t0 + 2 * MS);
        assert!(s.is_polling());
    }

    #[test]
    fn test_slot_bookkeeping() {
        let mut s = session();
        assert_eq!(s.slot_added(), 2);
        s.slots_swapped(0, 2);
        assert_eq!(s.slot(), 2);
        s.slot_removed(1);
        assert_eq!(s.slot(), 1);
        assert_eq!(s.cursors().slot_count(), 2);
    }

    #[test]
    fn test_history_jump() {
        let t0 = Instant::now();
        let mut s = session();
        let text = "x".repeat(2000);
        let mut host = BufferHost::new(&text);

        host.selection = Selection::cursor(100);
        assert!(s.save_history_point(&mut host));
        host.selection = Selection::cursor(1500);
        assert!(s.save_history_point(&mut host));

        s.history_back(t0);
        s.tick(&mut host, t0 + 100 * MS);
        assert_eq!(host.selection, Selection::cursor(100));

        s.history_forward(t0 + 200 * MS);
        s.tick(&mut host, t0 + 300 * MS);
        assert_eq!(host.selection, Selection::cursor(1500));
    }

    #[test]
    fn test_rehighlight_flags_selection() {
        let mut s = session();
        let mut host = BufferHost::new("foo bar foo");
        host.selection = Selection::new(0, 3);
        s.rehighlight_all(&mut host);
        let style = s.highlighter().highlighter().theme().selection_match;
        let flagged: Vec<_> = s
            .highlighter()
            .spans(0)
            .iter()
            .filter(|span| span.style == style)
            .map(|span| span.start)
            .collect();
        assert!(flagged.contains(&8));
    }

    #[test]
    fn test_find_and_repeat() {
        let mut s = session();
        let mut host = BufferHost::new("ab cd ab cd");
        assert!(s.find(&mut host, "cd", FindOptions::default()));
        assert_eq!(host.selection, Selection::new(3, 5));
        assert!(s.find_next(&mut host));
        assert_eq!(host.selection, Selection::new(9, 11));
        assert!(s.find_next(&mut host));
        assert_eq!(host.selection, Selection::new(3, 5));
        assert_eq!(host.notices.last().map(String::as_str), Some("Wrapped"));
        assert!(s.find_previous(&mut host));
        assert_eq!(host.selection, Selection::new(9, 11));
        assert!(!s.find(&mut host, "zz", FindOptions::default()));
        assert_eq!(s.find_history().latest(), Some("zz"));
    }

    #[test]
    fn test_replace_one_and_all() {
        let mut s = session();
        let mut host = BufferHost::new("a a a");
        assert!(s.find(&mut host, "a", FindOptions::default()));
        assert!(s.replace_one(&mut host, "a", "bb", FindOptions::default()));
        assert_eq!(host.text, "bb a a");
        assert_eq!(host.selection, Selection::new(3, 4));

        assert_eq!(s.replace_all(&mut host, "a", "c", FindOptions::default(), false), 2);
        assert_eq!(host.text, "bb c c");
        assert_eq!(host.notices.last().map(String::as_str), Some("Replaced: 2"));
    }

    #[test]
    fn test_paste_replaces_tabs() {
        let mut s = session();
        let mut host = BufferHost::new("<p></p>");
        host.selection = Selection::cursor(3);
        s.paste(&mut host, "\tx");
        assert_eq!(host.text, "<p>    x</p>");
        assert_eq!(host.selection, Selection::cursor(8));
    }

    #[test]
    fn test_paste_simplified_html() {
        let mut s = session();
        let mut host = BufferHost::new("<div></div>");
        host.selection = Selection::cursor(5);
        s.paste_simplified_html(&mut host, r#"<p style="x"><strong>hi</strong></p>"#, "hi", false);
        assert_eq!(host.text, "<div><p><b>hi</b></p></div>");

        let mut host = BufferHost::new("");
        s.paste_simplified_html(&mut host, "", "\tplain", false);
        assert_eq!(host.text, "\tplain");
    }

    #[test]
    fn test_wrap_enter_and_home_hooks() {
        let mut s = session();
        let mut host = BufferHost::new("  a {");
        host.selection = Selection::new(2, 3);
        assert!(s.toggle_wrap(&mut host, "<b>", "</b>", false));
        assert_eq!(host.text, "  <b>a</b> {");
        assert_eq!(host.selection, Selection::new(5, 6));

        host.selection = Selection::cursor(host.text.len());
        assert!(s.enter(&mut host));
        assert_eq!(host.text, "  <b>a</b> {\n    ");
        assert_eq!(host.selection, Selection::cursor(host.text.len()));

        s.home(&mut host, false);
        assert_eq!(host.selection, Selection::cursor(13));
        s.end(&mut host, true);
        assert_eq!(host.selection, Selection::new(13, 17));

        host.selection = Selection::cursor(1);
        assert!(!s.enter(&mut host));
    }

    #[test]
    fn test_completion_flow() {
        let mut s = session();
        let mut host = BufferHost::new("<blockq");
        host.selection = Selection::cursor(7);
        assert!(s.completions(&host).iter().any(|c| c == "<blockquote"));
        s.accept_completion(&mut host, "<blockquote");
        assert_eq!(host.text, "<blockquote");
    }

    #[test]
    fn test_cloze_navigation() {
        let mut s = session();
        let mut host = BufferHost::new("x %% y %%");
        assert!(s.next_cloze(&mut host, SearchDirection::Forward));
        assert_eq!(host.selection, Selection::new(2, 4));
        assert!(s.next_cloze(&mut host, SearchDirection::Forward));
        assert_eq!(host.selection, Selection::new(7, 9));
    }

    #[test]
    fn test_launch_failure_is_reported_but_file_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session_with_root(dir.path(), "cardcode-no-such-editor {file}");
        let mut host = BufferHost::new("<b>x</b>");
        s.open_external(&mut host, Instant::now());

        assert!(external::has_sentinel(host.text.lines().next().unwrap()));
        assert_eq!(s.error_count(), 1);
        assert!(host.notices[0].starts_with("1 errors"));
        let path = dir.path().join("Basic").join("Basic_card1_front.html");
        assert_eq!(std::fs::read_to_string(path).unwrap(), host.text);
        assert_eq!(s.check_external(&mut host), Staleness::Fresh);
    }

    #[test]
    fn test_update_from_unchanged_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session_with_root(dir.path(), "cardcode-no-such-editor {file}");
        let mut host = BufferHost::new("body {}");
        assert!(!s.update_from_external(&mut host));

        s.pane_switched(&mut host, Pane::Style, Instant::now());
        s.open_external(&mut host, Instant::now());
        assert!(!s.update_from_external(&mut host));
        assert_eq!(host.notices.last().map(String::as_str), Some("File has not been modified."));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session_with_root(dir.path(), "x");
        let mut host = BufferHost::new("plain");
        assert!(s.save_with_backup(&mut host));
        assert_eq!(host.text, "plain");

        let missing = dir.path().join("missing.html");
        assert!(!s.load_file(&mut host, &missing));
        assert_eq!(s.error_count(), 0);

        let file = dir.path().join("in.html");
        std::fs::write(&file, "<i>y</i>").unwrap();
        assert!(s.load_file(&mut host, &file));
        assert_eq!(host.text, "<i>y</i>");
    }

    #[test]
    fn test_close_persists() {
        let mut s = session();
        s.close().unwrap();
        assert!(!s.is_open());
        s.close().unwrap();
    }
}
