/// Pre-race countdown owned by the lobby screen, measured in frames.
#[derive(Debug, Clone)]
pub struct Countdown {
    frames: u32,
    remaining: Option<u32>,
}

impl Countdown {
    pub fn new(frames: u32) -> Self {
        Self {
            frames,
            remaining: None,
        }
    }

    pub fn start(&mut self) {
        self.remaining = Some(self.frames);
    }

    pub fn cancel(&mut self) {
        self.remaining = None;
    }

    pub fn is_active(&self) -> bool {
        self.remaining.is_some()
    }

    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    /// Returns true on the frame the countdown runs out.
    pub fn tick(&mut self) -> bool {
        match self.remaining {
            Some(left) if left <= 1 => {
                self.remaining = None;
                true
            }
            Some(left) => {
                self.remaining = Some(left - 1);
                false
            }
            None => false,
        }
    }
}
