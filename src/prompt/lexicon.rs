pub(crate) const ACKNOWLEDGEMENTS: &[&str] = &[
    "y", "yes", "yep", "yeah", "ok", "okay", "k", "sure", "thanks", "thx", "ty", "cool", "great",
    "nice", "continue", "go", "proceed",
];

pub(crate) const IMPERATIVE_VERBS: &[&str] = &[
    "fix",
    "add",
    "update",
    "implement",
    "change",
    "modify",
    "create",
    "refactor",
    "remove",
    "delete",
    "rename",
    "rewrite",
    "replace",
    "write",
    "fixing",
    "adding",
    "updating",
    "implementing",
    "changing",
    "modifying",
    "creating",
    "refactoring",
    "removing",
    "deleting",
    "renaming",
    "rewriting",
    "replacing",
    "writing",
];

pub(crate) const DETERMINERS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those", "my", "your", "our", "its", "their",
];

pub(crate) const DIRECTIVE_MODALS: &[&str] = &[
    "should", "must", "needs", "need", "would", "will", "goes",
];

pub(crate) const SCOPE_TOTAL: &[&str] = &["all", "every", "everything", "entire", "whole"];

pub(crate) const QUESTION_WORDS: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "which", "question", "wondering", "curious",
];

pub(crate) const QUESTION_OPENERS: &[&str] = &[
    "is", "are", "does", "do", "did", "can", "could", "should", "would", "will", "has", "have",
];

pub(crate) const TRIGGER_WORDS: &[(&str, &str)] = &[
    ("quick", "quick"),
    ("quickly", "quick"),
    ("just", "just"),
    ("simple", "simple"),
    ("simply", "simple"),
    ("minor", "minor"),
];

pub(crate) const FRUSTRATION_PHRASES: &[&str] = &[
    "already said",
    "already told",
    "i said",
    "no, i meant",
    "no i meant",
    "how many times",
];

pub(crate) const FRUSTRATION_WORDS: &[&str] = &["again"];

pub(crate) const BUG_WORDS: &[&str] = &[
    "bug",
    "bugs",
    "crash",
    "crashes",
    "crashing",
    "broken",
    "regression",
];

pub(crate) const VERIFY_PHRASES: &[&str] = &["test it", "make sure it works", "run the tests"];
