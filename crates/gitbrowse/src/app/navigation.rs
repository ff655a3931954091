use super::App;
use gitbrowse_core::{Backend, FileHistory, HistoryError};
use tracing::info;

impl<B: Backend> App<B> {
    /// Step `count` commits towards the newest one
    pub fn newer_commit(&mut self, count: usize) -> Result<(), HistoryError> {
        for _ in 0..count {
            if !self.move_commit(FileHistory::advance)? {
                break;
            }
        }
        Ok(())
    }

    /// Step `count` commits towards the oldest one
    pub fn older_commit(&mut self, count: usize) -> Result<(), HistoryError> {
        for _ in 0..count {
            if !self.move_commit(FileHistory::retreat)? {
                break;
            }
        }
        Ok(())
    }

    /// Move one commit and carry the highlight over to the same line in the
    /// new revision. A line that no longer exists keeps its row number.
    fn move_commit(&mut self, step: fn(&mut FileHistory<B>) -> bool) -> Result<bool, HistoryError> {
        let start = self.history.current_commit().id.clone();
        if !step(&mut self.history) {
            self.modal.ring_bell();
            return Ok(false);
        }
        let finish = self.history.current_commit().id.clone();

        let line = self.modal.state.highlight_line;
        let target = self.history.line_mapping(&start, &finish)?.map_forward(line);
        let len = self.history.blame()?.len();
        self.modal.set_highlight(target.unwrap_or(line), len);

        info!(from = %start, to = %finish, line, ?target, "moved commit");
        Ok(true)
    }
}
