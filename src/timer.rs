// Cancellable delay timers and the tooltip show/hide machine built on them.
//
// Time is passed in explicitly as a `Duration` since an arbitrary epoch, so
// the host event loop owns the clock and tests can step it by hand.
use crate::config::TooltipSettings;
use std::time::Duration;

/// At most one pending action. Scheduling again supersedes the previous one.
#[derive(Debug, Clone)]
pub struct DelayTimer<A> {
    pending: Option<(Duration, A)>,
}

impl<A> Default for DelayTimer<A> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<A> DelayTimer<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer to fire `delay` after `now`. Returns the superseded
    /// action, if one was pending.
    pub fn schedule(&mut self, now: Duration, delay: Duration, action: A) -> Option<A> {
        self.pending
            .replace((now + delay, action))
            .map(|(_, previous)| previous)
    }

    pub fn cancel(&mut self) -> Option<A> {
        self.pending.take().map(|(_, action)| action)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn due_at(&self) -> Option<Duration> {
        self.pending.as_ref().map(|(due, _)| *due)
    }

    /// Take the action if it is due at `now`.
    pub fn poll(&mut self, now: Duration) -> Option<A> {
        match self.due_at() {
            Some(due) if due <= now => self.cancel(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TooltipEvent<T> {
    Show(T),
    Hide,
}

/// Delayed-show / quick-hide tooltip behavior for the side list.
///
/// - a tooltip appears only after the pointer has rested on a target for
///   the show delay;
/// - once visible, renewed movement schedules a hide after the hide delay;
/// - entering the tooltip itself cancels any pending hide.
#[derive(Debug, Clone)]
pub struct TooltipTimers<T> {
    show_delay: Duration,
    hide_delay: Duration,
    show: DelayTimer<T>,
    hide: DelayTimer<()>,
    visible: Option<T>,
}

impl<T: Clone> TooltipTimers<T> {
    pub fn new(show_delay: Duration, hide_delay: Duration) -> Self {
        Self {
            show_delay,
            hide_delay,
            show: DelayTimer::new(),
            hide: DelayTimer::new(),
            visible: None,
        }
    }

    pub fn from_settings(settings: &TooltipSettings) -> Self {
        Self::new(settings.show_delay(), settings.hide_delay())
    }

    pub fn visible(&self) -> Option<&T> {
        self.visible.as_ref()
    }

    pub fn show_pending(&self) -> bool {
        self.show.is_pending()
    }

    pub fn hide_pending(&self) -> bool {
        self.hide.is_pending()
    }

    /// Pointer moved to `target` (`None` = over nothing).
    pub fn pointer_moved(&mut self, now: Duration, target: Option<T>) {
        if self.visible.is_some() {
            self.hide.schedule(now, self.hide_delay, ());
        }
        match target {
            Some(t) => {
                self.show.schedule(now, self.show_delay, t);
            }
            None => {
                self.show.cancel();
            }
        }
    }

    pub fn pointer_entered_tooltip(&mut self) {
        self.hide.cancel();
    }

    pub fn pointer_left_tooltip(&mut self, now: Duration) {
        if self.visible.is_some() {
            self.hide.schedule(now, self.hide_delay, ());
        }
    }

    /// Fire every due timer, earliest first.
    pub fn tick(&mut self, now: Duration) -> Vec<TooltipEvent<T>> {
        let hide_first = match (self.hide.due_at(), self.show.due_at()) {
            (Some(h), Some(s)) => h <= s,
            _ => true,
        };
        let mut events = Vec::new();
        if hide_first {
            self.fire_hide(now, &mut events);
            self.fire_show(now, &mut events);
        } else {
            self.fire_show(now, &mut events);
            self.fire_hide(now, &mut events);
        }
        events
    }

    fn fire_hide(&mut self, now: Duration, events: &mut Vec<TooltipEvent<T>>) {
        if self.hide.poll(now).is_some() && self.visible.take().is_some() {
            events.push(TooltipEvent::Hide);
        }
    }

    fn fire_show(&mut self, now: Duration, events: &mut Vec<TooltipEvent<T>>) {
        if let Some(target) = self.show.poll(now) {
            self.hide.cancel();
            self.visible = Some(target.clone());
            events.push(TooltipEvent::Show(target));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn timers() -> TooltipTimers<&'static str> {
        TooltipTimers::new(ms(600), ms(200))
    }

    #[test]
    fn test_delay_timer_supersedes() {
        let mut t = DelayTimer::new();
        assert_eq!(t.schedule(ms(0), ms(100), "a"), None);
        assert_eq!(t.schedule(ms(50), ms(100), "b"), Some("a"));
        assert_eq!(t.poll(ms(120)), None);
        assert_eq!(t.poll(ms(150)), Some("b"));
        assert_eq!(t.poll(ms(500)), None);
    }

    #[test]
    fn test_delay_timer_cancel() {
        let mut t = DelayTimer::new();
        t.schedule(ms(0), ms(10), 1);
        assert_eq!(t.cancel(), Some(1));
        assert!(!t.is_pending());
        assert_eq!(t.poll(ms(100)), None);
    }

    #[test]
    fn test_show_only_after_idle() {
        let mut tt = timers();
        tt.pointer_moved(ms(0), Some("A"));
        tt.pointer_moved(ms(400), Some("A"));
        assert!(tt.tick(ms(700)).is_empty());
        assert_eq!(tt.tick(ms(1000)), vec![TooltipEvent::Show("A")]);
        assert_eq!(tt.visible(), Some(&"A"));
        // a repeated tick never fires twice
        assert!(tt.tick(ms(2000)).is_empty());
    }

    #[test]
    fn test_movement_hides_quickly() {
        let mut tt = timers();
        tt.pointer_moved(ms(0), Some("A"));
        tt.tick(ms(600));
        tt.pointer_moved(ms(1000), Some("B"));
        assert_eq!(tt.tick(ms(1200)), vec![TooltipEvent::Hide]);
        assert_eq!(tt.visible(), None);
        assert_eq!(tt.tick(ms(1600)), vec![TooltipEvent::Show("B")]);
    }

    #[test]
    fn test_entering_tooltip_cancels_hide() {
        let mut tt = timers();
        tt.pointer_moved(ms(0), Some("A"));
        tt.tick(ms(600));
        tt.pointer_moved(ms(700), None);
        assert!(tt.hide_pending());
        tt.pointer_entered_tooltip();
        assert!(!tt.hide_pending());
        assert!(tt.tick(ms(5000)).is_empty());
        assert_eq!(tt.visible(), Some(&"A"));

        tt.pointer_left_tooltip(ms(5000));
        assert_eq!(tt.tick(ms(5200)), vec![TooltipEvent::Hide]);
    }

    #[test]
    fn test_leaving_targets_cancels_show() {
        let mut tt = timers();
        tt.pointer_moved(ms(0), Some("A"));
        tt.pointer_moved(ms(100), None);
        assert!(!tt.show_pending());
        assert!(tt.tick(ms(1000)).is_empty());
    }

    #[test]
    fn test_late_tick_fires_in_due_order() {
        let mut tt = timers();
        tt.pointer_moved(ms(0), Some("A"));
        tt.tick(ms(600));
        tt.pointer_moved(ms(1000), Some("B"));
        assert_eq!(
            tt.tick(ms(3000)),
            vec![TooltipEvent::Hide, TooltipEvent::Show("B")]
        );
        assert_eq!(tt.visible(), Some(&"B"));
    }

    #[test]
    fn test_settings_delays() {
        let mut now = Duration::ZERO;
        let mut tt = TooltipTimers::from_settings(&TooltipSettings::default());
        tt.pointer_moved(now, Some(1u32));
        now += ms(599);
        assert!(tt.tick(now).is_empty());
        now += ms(1);
        assert_eq!(tt.tick(now), vec![TooltipEvent::Show(1)]);
    }
}
