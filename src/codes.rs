use std::collections::VecDeque;
use std::sync::Mutex;

use rand::Rng;

use crate::limits::UNLOCK_CODE_LEN;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Produces the unlock code handed out with each admitted reservation.
pub trait CodeGenerator: Send + Sync {
    fn next_code(&self) -> String;
}

/// Uniform draws from `[A-Z0-9]`. Codes are not checked for collisions.
#[derive(Debug, Default)]
pub struct RandomCodes;

impl CodeGenerator for RandomCodes {
    fn next_code(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..UNLOCK_CODE_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

/// Hands out a scripted sequence, then falls back to `CODE0001`, `CODE0002`, ...
#[derive(Debug, Default)]
pub struct FixedCodes {
    queue: Mutex<VecDeque<String>>,
    issued: Mutex<u64>,
}

impl FixedCodes {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: Mutex::new(codes.into_iter().map(Into::into).collect()),
            issued: Mutex::new(0),
        }
    }
}

impl CodeGenerator for FixedCodes {
    fn next_code(&self) -> String {
        let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        *issued += 1;
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue
            .pop_front()
            .unwrap_or_else(|| format!("CODE{:04}", *issued))
    }
}
