use proptest::prelude::*;

use bangtags::bangtag::token::{escape, restore, tokenize, Segment, MARKER, PLACEHOLDER};
use bangtags::bangtag::{process, Outcome};
use bangtags::config::Config;
use bangtags::host::{Actor, VariableStore};
use bangtags::memory::MemoryHost;
use bangtags::post::Post;
use bangtags::script::{eval_str, VarContext};
use bangtags::var::VarStore;

/// Building blocks for random posts: scope openers, closers and filler.
const PIECES: &[&str] = &[
    "#!var:x:-",
    "#!var:y:-",
    "#!var:end",
    "#!var:endall",
    "#!tf:take:2",
    "#!tf:s:a:b",
    "#!tf:end",
    "#!hide",
    "#!hide:end",
    "#!comment",
    "#!comment:end",
    "#!end",
    "#!endall",
    "#!once",
    "#!var:x",
    "a",
    "b c",
    "word",
];

fn post_text() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(PIECES), 0..24).prop_map(|pieces| pieces.join(" "))
}

/// Like [`post_text`], minus the comment pieces, which swallow what follows.
fn post_text_without_comments() -> impl Strategy<Value = String> {
    let pieces: Vec<&'static str> = PIECES.iter().copied().filter(|p| !p.starts_with("#!comment")).collect();
    prop::collection::vec(prop::sample::select(pieces), 0..24).prop_map(|pieces| pieces.join(" "))
}

proptest! {
    /// Tokenizer segments concatenate back to the input.
    #[test]
    fn tokenize_is_lossless(s in "\\PC*") {
        let joined: String = tokenize(&s).iter().map(Segment::as_str).collect();
        prop_assert_eq!(joined, s);
    }
}

proptest! {
    /// Every command segment begins with the marker; no literal segment is
    /// empty.
    #[test]
    fn tokenize_segment_shapes(s in "[a-z #!:{}]*") {
        for segment in tokenize(&s) {
            match segment {
                Segment::Command(c) => prop_assert!(c.starts_with(MARKER)),
                Segment::Text(t) => prop_assert!(!t.is_empty()),
            }
        }
    }
}

proptest! {
    /// Escaping then restoring is the identity for text without the
    /// placeholder character.
    #[test]
    fn escape_restore_identity(s in "[a-z #!]*") {
        prop_assume!(!s.contains(PLACEHOLDER));
        let escaped = escape(&s);
        prop_assert!(!escaped.contains("#!!"));
        prop_assert_eq!(restore(&escaped).into_owned(), s.replace("#!!", "#!"));
    }
}

proptest! {
    /// However scopes are opened and closed, processing succeeds and no
    /// per-scope state outlives the pass.
    #[test]
    fn scopes_always_balance(text in post_text()) {
        let mut host = MemoryHost::new();
        let mut post = Post::new("alice", text);
        let outcome = process(&mut host, &Config::default(), &Actor::new("alice"), &mut post);
        prop_assert!(outcome.is_ok());
        let keys = VariableStore::keys(&host, "alice").unwrap();
        prop_assert!(keys.iter().all(|k| !k.starts_with("_tf:")), "leaked keys: {:?}", keys);
    }
}

proptest! {
    /// `endall` leaves nothing open: text after it is kept, unfiltered and
    /// uncaptured.
    #[test]
    fn endall_closes_every_scope(text in post_text_without_comments()) {
        let mut host = MemoryHost::new();
        let mut post = Post::new("alice", format!("{text} #!endall tail"));
        let outcome = process(&mut host, &Config::default(), &Actor::new("alice"), &mut post).unwrap();
        prop_assert!(matches!(outcome, Outcome::Saved(_)));
        prop_assert!(post.text.ends_with("tail"), "text: {:?}", post.text);
        for name in ["x", "y"] {
            let value = host.var("alice", name).unwrap_or_default();
            prop_assert!(!value.contains("tail"), "{} captured {:?}", name, value);
        }
    }
}

proptest! {
    /// Text without the marker is saved untouched.
    #[test]
    fn plain_text_is_unchanged(text in "[a-zA-Z .,@]*") {
        let mut host = MemoryHost::new();
        let mut post = Post::new("alice", text.clone());
        let outcome = process(&mut host, &Config::default(), &Actor::new("alice"), &mut post).unwrap();
        prop_assert!(matches!(outcome, Outcome::Saved(_)));
        prop_assert_eq!(post.text, text);
    }
}

proptest! {
    /// The expression evaluator never panics on arbitrary input.
    #[test]
    fn eval_does_not_panic(s in "\\PC{0,64}") {
        let mut vars = VarStore::new();
        let _ = eval_str(&s, &mut VarContext::new(&mut vars));
    }
}
