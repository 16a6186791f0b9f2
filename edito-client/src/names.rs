//! Display-name generation for peers who skip the login prompt.

use rand::seq::SliceRandom;

const ADJECTIVES: &[&str] = &[
    "Brave", "Calm", "Clever", "Curious", "Eager", "Gentle", "Jolly", "Keen", "Lively", "Mellow",
    "Nimble", "Plucky", "Quiet", "Spry", "Sunny", "Witty",
];

const NOUNS: &[&str] = &[
    "Badger", "Falcon", "Heron", "Lynx", "Marmot", "Otter", "Petrel", "Puffin", "Raven", "Seal",
    "Stoat", "Swift", "Tern", "Vole", "Wombat", "Wren",
];

/// A random adjective+noun pair, e.g. `CleverOtter`.
pub fn silly_name() -> String {
    let mut rng = rand::thread_rng();
    format!(
        "{}{}",
        ADJECTIVES.choose(&mut rng).unwrap_or(&"Quiet"),
        NOUNS.choose(&mut rng).unwrap_or(&"Wren"),
    )
}
