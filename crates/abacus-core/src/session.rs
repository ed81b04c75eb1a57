use std::fmt::Write as _;

/// One variable slot per lowercase letter.
pub const SLOT_COUNT: usize = 26;

/// A variable slot within a session, indexed by letter (`a` = 0 .. `z` = 25).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Slot(u8);

impl Slot {
    /// Build a slot from an ASCII letter, case-folded. Returns `None` for
    /// anything that is not a single alphabetic ASCII character.
    pub fn from_letter(c: char) -> Option<Self> {
        if c.is_ascii_alphabetic() {
            Some(Self(c.to_ascii_lowercase() as u8 - b'a'))
        } else {
            None
        }
    }

    /// All 26 slots in ascending letter order.
    pub fn all() -> impl Iterator<Item = Slot> {
        (0..SLOT_COUNT as u8).map(Slot)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn letter(self) -> char {
        (b'a' + self.0) as char
    }
}

/// The full state of one session: 26 slots, each undefined or holding a
/// float. An undefined slot has no value at all — it must never be read
/// as zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Session {
    defined: [bool; SLOT_COUNT],
    values: [f64; SLOT_COUNT],
}

impl Default for Session {
    fn default() -> Self {
        Self {
            defined: [false; SLOT_COUNT],
            values: [0.0; SLOT_COUNT],
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot's value, or `None` while the slot is undefined.
    pub fn get(&self, slot: Slot) -> Option<f64> {
        if self.defined[slot.index()] {
            Some(self.values[slot.index()])
        } else {
            None
        }
    }

    /// Define the slot and store a value.
    pub fn set(&mut self, slot: Slot, value: f64) {
        self.defined[slot.index()] = true;
        self.values[slot.index()] = value;
    }

    pub fn defined_count(&self) -> usize {
        self.defined.iter().filter(|d| **d).count()
    }

    /// Defined (slot, value) pairs in ascending letter order.
    pub fn iter_defined(&self) -> impl Iterator<Item = (Slot, f64)> + '_ {
        Slot::all().filter_map(|s| self.get(s).map(|v| (s, v)))
    }

    /// Render the session to the broadcast wire format: one line per
    /// defined slot, ascending letter order. Values under 1000 in
    /// magnitude use fixed 6-decimal precision, larger ones scientific
    /// notation with an 8-digit mantissa.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (slot, value) in self.iter_defined() {
            if value.abs() < 1000.0 {
                let _ = writeln!(out, "{} = {:.6}", slot.letter(), value);
            } else {
                let _ = writeln!(out, "{} = {:.8e}", slot.letter(), value);
            }
        }
        out
    }
}
