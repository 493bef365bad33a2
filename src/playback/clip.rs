//! Clip playback.
//!
//! One driving branch walks the clip's enabled notes in time order,
//! waiting out the gap to each note's position and handing it to
//! [`play_note`]. Cancelling the returned handle tears down the driver
//! and every note it started.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::device::Device;
use crate::playback::config::PlaybackConfig;
use crate::playback::note::{play_note, NoteHandle};
use crate::sequencing::{Clip, ClipRegistry, Note};
use crate::timing::{Canceled, TaskHandle, TimeContext};

/// Options for [`play_clip`].
pub struct PlayClipOptions {
    /// When true (the default), the returned handle completes only once
    /// the clip's whole window has elapsed, not when its last note ends.
    pub wait_for_completion: bool,
    /// Called just before each note starts. Return a substitute note to
    /// play instead, or `None` to skip the note entirely.
    pub on_note_start: Option<Rc<dyn Fn(&Note) -> Option<Note>>>,
}

impl Default for PlayClipOptions {
    fn default() -> Self {
        Self {
            wait_for_completion: true,
            on_note_start: None,
        }
    }
}

/// Handle to a playing clip. Awaitable: resolves when the driving
/// branch finishes (or `Err(Canceled)` if it was canceled).
pub struct ClipHandle {
    driver: TaskHandle<()>,
    notes: Rc<RefCell<Vec<NoteHandle>>>,
}

impl ClipHandle {
    /// Cancel the driving branch and every note it has started so far.
    /// Sounding notes receive their note-off immediately.
    pub fn cancel(&self) {
        self.driver.cancel();
        for note in self.notes.borrow().iter() {
            note.cancel();
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.driver.is_canceled()
    }

    pub fn is_settled(&self) -> bool {
        self.driver.is_settled()
    }
}

impl Future for ClipHandle {
    type Output = Result<(), Canceled>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().driver).poll(cx)
    }
}

/// Play every enabled note of `clip` inside `ctx`.
pub fn play_clip<D: Device + 'static>(
    clip: &Clip,
    ctx: &TimeContext,
    device: &Rc<D>,
    config: &PlaybackConfig,
    options: PlayClipOptions,
) -> ClipHandle {
    let notes = clip.playable_notes();
    let clip_duration = clip.duration;
    let handles: Rc<RefCell<Vec<NoteHandle>>> = Rc::new(RefCell::new(Vec::new()));

    let recorded = handles.clone();
    let device = device.clone();
    let config = *config;
    let driver = ctx.branch(move |c| async move {
        for note in notes {
            let delta = note.position - c.prog_beats();
            if c.wait(delta).await.is_err() {
                return;
            }
            let played = match &options.on_note_start {
                Some(hook) => hook(&note),
                None => Some(note),
            };
            if let Some(note) = played {
                recorded
                    .borrow_mut()
                    .push(play_note(&c, &note, device.as_ref(), &config));
            }
        }
        if options.wait_for_completion {
            let remaining = clip_duration - c.prog_beats();
            if remaining > 0.0 {
                let _ = c.wait(remaining).await;
            }
        }
    });

    ClipHandle {
        driver,
        notes: handles,
    }
}

/// Look up `name` in an explicit registry and play it. `None` if the
/// registry has no such clip.
pub fn play_named_clip<D: Device + 'static>(
    registry: &ClipRegistry,
    name: &str,
    ctx: &TimeContext,
    device: &Rc<D>,
    config: &PlaybackConfig,
    options: PlayClipOptions,
) -> Option<ClipHandle> {
    let clip = registry.get(name)?;
    Some(play_clip(clip, ctx, device, config, options))
}
