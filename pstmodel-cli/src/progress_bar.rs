use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use pstmodel::progress::{ByteNum, ProgressNotifier};

#[derive(Debug, Default)]
struct PstProgressBarState {
    length: u64,
    bytes: bool,
    initialized: bool,
    message: &'static str,
}

/// Progress bar shared by all the stages of a command. Each stage starts by
/// calling [`PstProgressBar::start_bytes`] or [`PstProgressBar::start_iters`];
/// the style is picked lazily on the first update.
#[derive(Debug, Clone)]
pub(crate) struct PstProgressBar {
    bar: ProgressBar,
    state: Arc<Mutex<PstProgressBarState>>,
}

impl PstProgressBar {
    pub fn new() -> PstProgressBar {
        let init_bar = ProgressBar::hidden();
        init_bar.set_style(ProgressStyle::default_spinner());
        init_bar.enable_steady_tick(Duration::from_millis(50));
        init_bar.set_message("Initializing...");

        Self {
            bar: init_bar,
            state: Arc::new(Mutex::new(PstProgressBarState::default())),
        }
    }

    pub fn show(&self) {
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
    }

    pub fn is_hidden(&self) -> bool {
        self.bar.is_hidden()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear()
    }

    #[inline]
    fn init(&self) {
        let mut state = self.state.lock().unwrap();
        if state.initialized {
            return;
        }

        self.bar.set_length(state.length);
        self.bar.set_position(0);
        self.bar.set_message(state.message);

        let template = match (state.bytes, state.length == 0) {
            (true, true) => "{spinner} {msg}: {bytes}/? ({bytes_per_sec})",
            (true, false) => "{msg}: {wide_bar} {bytes}/{total_bytes} [ETA {eta}]",
            (false, true) => "{spinner} {msg}: {pos}/? ({per_sec})",
            (false, false) => "{msg}: {wide_bar} {pos}/{len}",
        };
        let style = if state.length == 0 {
            ProgressStyle::default_spinner()
        } else {
            ProgressStyle::default_bar()
        };
        self.bar.set_style(
            style
                .template(template)
                .expect("Invalid progress bar template"),
        );
        state.initialized = true;
    }

    /// Starts a stage reporting processed bytes; `length` is 0 if unknown.
    pub fn start_bytes(&self, message: &'static str, length: u64) {
        let mut state = self.state.lock().unwrap();

        state.initialized = false;
        state.bytes = true;
        state.length = length;
        state.message = message;
    }

    /// Starts a stage reporting iterations.
    pub fn start_iters(&self, message: &'static str) {
        let mut state = self.state.lock().unwrap();

        state.initialized = false;
        state.bytes = false;
        state.length = 0;
        state.message = message;
    }

    pub fn inc(&self, value: u64) {
        self.init();
        self.bar.inc(value);
    }

    pub fn println<I: AsRef<str>>(&self, msg: I) {
        self.bar.println(msg);
    }
}

impl ProgressNotifier for PstProgressBar {
    fn processed_bytes(&self, bytes: ByteNum) {
        self.inc(bytes.get() as u64);
    }

    // the worklist grows while contexts are selected, so only the bar length
    // is updated here
    fn set_iter_num(&self, num_iter: u64) {
        self.init();
        self.bar.set_length(num_iter);
    }

    fn inc_iter(&self) {
        self.inc(1);
    }
}
