//! The WOOT document: an ordered sequence of identity-carrying characters
//! bounded by two invisible sentinels.
//!
//! Deletion never removes a character; it clears the `visible` flag and the
//! tombstone stays in the sequence so that later integrations can still
//! resolve their neighbour identities.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of the opening sentinel.
pub const START_ID: &str = "start";
/// Identity of the closing sentinel.
pub const END_ID: &str = "end";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("position out of bounds")]
    PositionOutOfBounds,
    #[error("empty character identity")]
    EmptyIdentity,
    #[error("subsequence bound(s) not present")]
    BoundsNotPresent,
}

/// One element of the WOOT sequence.
///
/// `id_previous`/`id_next` are the identities of the characters this one
/// was generated between. They are immutable metadata: integration reads
/// them but never rewrites them, and they need not be sequence-adjacent
/// after concurrent inserts have landed in the same region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Visible")]
    pub visible: bool,
    #[serde(rename = "Value")]
    pub value: String,
    #[serde(rename = "IDPrevious")]
    pub id_previous: String,
    #[serde(rename = "IDNext")]
    pub id_next: String,
}

/// Per-document identity allocator: the server-assigned site-id plus a
/// local clock incremented on every local insert.
///
/// Identities render as `"{site}-{clock}"`. The separator keeps the
/// encoding injective (`(1,23)` and `(12,3)` must not collide), and the
/// rendered string doubles as the comparison key for the identity total
/// order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Site {
    id: u64,
    clock: u64,
}

impl Site {
    pub fn new(id: u64) -> Self {
        Self { id, clock: 0 }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    fn render(&self, clock: u64) -> String {
        format!("{}-{}", self.id, clock)
    }
}

fn start_sentinel() -> Character {
    Character {
        id: START_ID.to_string(),
        visible: false,
        value: String::new(),
        id_previous: String::new(),
        id_next: END_ID.to_string(),
    }
}

fn end_sentinel() -> Character {
    Character {
        id: END_ID.to_string(),
        visible: false,
        value: String::new(),
        id_previous: START_ID.to_string(),
        id_next: String::new(),
    }
}

/// A replicated plain-text document.
///
/// The user-visible string is the concatenation of `value` over visible
/// characters in sequence order. Visible positions are 1-indexed
/// throughout, matching the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "Characters")]
    characters: Vec<Character>,
    #[serde(skip)]
    site: Site,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A fresh document: the two sentinels, nothing else.
    pub fn new() -> Self {
        Self {
            characters: vec![start_sentinel(), end_sentinel()],
            site: Site::default(),
        }
    }

    /// A fresh document minting identities for the given site.
    pub fn with_site(site_id: u64) -> Self {
        let mut doc = Self::new();
        doc.site = Site::new(site_id);
        doc
    }

    /// Replay a UTF-8 text as a sequence of local inserts.
    ///
    /// Identities are minted from the default site; use [`load_with_site`]
    /// when a site has already been assigned.
    ///
    /// [`load_with_site`]: Document::load_with_site
    pub fn load(text: &str) -> Result<Self, DocumentError> {
        Self::load_with_site(Site::default(), text)
    }

    /// Replay a UTF-8 text as local inserts, continuing the given site's
    /// clock so the minted identities stay unique within the session.
    ///
    /// A literal `'\n'` is inserted between source lines but not after the
    /// last one, so `load` followed by [`save`](Document::save) reproduces
    /// the input verbatim.
    pub fn load_with_site(site: Site, text: &str) -> Result<Self, DocumentError> {
        let mut doc = Self::new();
        doc.site = site;

        let lines: Vec<&str> = text.split('\n').collect();
        let mut pos = 1;
        for (i, line) in lines.iter().enumerate() {
            for ch in line.chars() {
                doc.generate_insert(pos, ch.to_string())?;
                pos += 1;
            }
            if i < lines.len() - 1 {
                doc.generate_insert(pos, "\n")?;
                pos += 1;
            }
        }
        Ok(doc)
    }

    /// The visible document content, verbatim.
    pub fn save(&self) -> String {
        self.content()
    }

    pub fn site(&self) -> Site {
        self.site
    }

    pub fn set_site(&mut self, site: Site) {
        self.site = site;
    }

    /// Install the server-assigned site-id, keeping the local clock.
    pub fn set_site_id(&mut self, site_id: u64) {
        self.site.id = site_id;
    }

    /// Concatenation of `value` over visible characters in sequence order.
    pub fn content(&self) -> String {
        self.characters
            .iter()
            .filter(|c| c.visible)
            .map(|c| c.value.as_str())
            .collect()
    }

    /// Total sequence length, tombstones and sentinels included.
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// The full internal sequence, sentinels and tombstones included.
    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    /// The k-th visible character, 1-indexed.
    pub fn ith_visible(&self, position: usize) -> Option<&Character> {
        self.characters
            .iter()
            .filter(|c| c.visible)
            .nth(position.checked_sub(1)?)
    }

    /// Sequence index of the character with this identity.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.characters.iter().position(|c| c.id == id)
    }

    pub fn find(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// The character at the given sequence index.
    pub fn element_at(&self, position: usize) -> Result<&Character, DocumentError> {
        self.characters
            .get(position)
            .ok_or(DocumentError::PositionOutOfBounds)
    }

    /// The characters strictly between the two bound identities in the
    /// current sequence, inclusive of neither endpoint.
    ///
    /// Equal bounds yield an empty slice. A missing bound, or bounds whose
    /// positions are inverted, yields `BoundsNotPresent`.
    pub fn subsequence(&self, start_id: &str, end_id: &str) -> Result<&[Character], DocumentError> {
        let start = self
            .position(start_id)
            .ok_or(DocumentError::BoundsNotPresent)?;
        let end = self.position(end_id).ok_or(DocumentError::BoundsNotPresent)?;

        if start > end {
            return Err(DocumentError::BoundsNotPresent);
        }
        if start == end {
            return Ok(&[]);
        }
        Ok(&self.characters[start + 1..end])
    }

    /// Splice a character into the internal sequence at the given index.
    ///
    /// Index 0 and the final index are reserved for the sentinels, so both
    /// are out of bounds here. Neighbour `id_previous`/`id_next` fields are
    /// left untouched: they record the generation context, not the current
    /// adjacency.
    pub fn local_insert(&mut self, character: Character, position: usize) -> Result<(), DocumentError> {
        if position == 0 || position >= self.characters.len() {
            return Err(DocumentError::PositionOutOfBounds);
        }
        if character.id.is_empty() {
            return Err(DocumentError::EmptyIdentity);
        }
        self.characters.insert(position, character);
        Ok(())
    }

    /// Mint a new character at the given visible position (1-indexed) and
    /// integrate it locally.
    ///
    /// Returns the freshly generated character so the caller can put it on
    /// the wire. The local clock only advances when the insert succeeds.
    pub fn generate_insert(
        &mut self,
        position: usize,
        value: impl Into<String>,
    ) -> Result<Character, DocumentError> {
        let id = self.site.render(self.site.clock + 1);

        let id_previous = self
            .ith_visible(position.wrapping_sub(1))
            .map(|c| c.id.clone())
            .unwrap_or_else(|| START_ID.to_string());
        let id_next = self
            .ith_visible(position)
            .map(|c| c.id.clone())
            .unwrap_or_else(|| END_ID.to_string());

        let character = Character {
            id,
            visible: true,
            value: value.into(),
            id_previous: id_previous.clone(),
            id_next: id_next.clone(),
        };

        self.integrate_between(character.clone(), &id_previous, &id_next)?;
        self.site.clock += 1;
        Ok(character)
    }

    /// Integrate a remotely generated character.
    ///
    /// Requires both of the character's neighbour identities to be present
    /// locally (per-peer FIFO delivery guarantees this). Re-integrating an
    /// identity that is already in the sequence is a no-op.
    pub fn integrate_insert(&mut self, character: Character) -> Result<(), DocumentError> {
        if character.id.is_empty() {
            return Err(DocumentError::EmptyIdentity);
        }
        if self.contains(&character.id) {
            return Ok(());
        }
        let id_previous = character.id_previous.clone();
        let id_next = character.id_next.clone();
        self.integrate_between(character, &id_previous, &id_next)
    }

    /// The WOOT integration rule.
    ///
    /// Among the characters currently between `prev` and `next`, only those
    /// whose own generation window spans the whole (`prev`, `next`) range
    /// compete with `character`; the identity order picks its slot among
    /// them and the window narrows until the gap is empty. Each recursion
    /// strictly shrinks the window, so this terminates.
    fn integrate_between(
        &mut self,
        character: Character,
        prev_id: &str,
        next_id: &str,
    ) -> Result<(), DocumentError> {
        enum Placement {
            At(usize),
            Between(String, String),
        }

        let placement = {
            let prev_pos = self
                .position(prev_id)
                .ok_or(DocumentError::BoundsNotPresent)?;
            let next_pos = self
                .position(next_id)
                .ok_or(DocumentError::BoundsNotPresent)?;
            if prev_pos > next_pos {
                return Err(DocumentError::BoundsNotPresent);
            }

            let between = self.subsequence(prev_id, next_id)?;
            if between.is_empty() {
                Placement::At(next_pos)
            } else {
                let spanning: Vec<&Character> = between
                    .iter()
                    .filter(|d| {
                        let dp = self.position(&d.id_previous);
                        let dn = self.position(&d.id_next);
                        matches!((dp, dn), (Some(dp), Some(dn)) if dp <= prev_pos && dn >= next_pos)
                    })
                    .collect();

                if spanning.is_empty() {
                    Placement::At(next_pos)
                } else {
                    let mut i = 0;
                    while i < spanning.len() && spanning[i].id < character.id {
                        i += 1;
                    }
                    let lower = if i == 0 {
                        prev_id.to_string()
                    } else {
                        spanning[i - 1].id.clone()
                    };
                    let upper = if i == spanning.len() {
                        next_id.to_string()
                    } else {
                        spanning[i].id.clone()
                    };
                    Placement::Between(lower, upper)
                }
            }
        };

        match placement {
            Placement::At(position) => self.local_insert(character, position),
            Placement::Between(lower, upper) => {
                self.integrate_between(character, &lower, &upper)
            }
        }
    }

    /// Tombstone the character at the given visible position (1-indexed).
    ///
    /// Returns the tombstoned character so the caller can put the
    /// operation on the wire, or `None` if no such visible character
    /// exists.
    pub fn generate_delete(&mut self, position: usize) -> Option<Character> {
        let id = self.ith_visible(position)?.id.clone();
        let index = self.position(&id)?;
        self.characters[index].visible = false;
        Some(self.characters[index].clone())
    }

    /// Tombstone a remotely deleted character.
    ///
    /// Deleting an identity that is not in the sequence is a silent no-op:
    /// delete is idempotent and commutes with insert of other identities.
    pub fn integrate_delete(&mut self, character: &Character) {
        if let Some(index) = self.position(&character.id) {
            self.characters[index].visible = false;
        }
    }
}
