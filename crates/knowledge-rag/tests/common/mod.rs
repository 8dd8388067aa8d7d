//! Test collaborators shared by the integration suites.

#![allow(dead_code)]

use async_trait::async_trait;
use knowledge_rag::{AnswerSynthesizer, EmbeddingProvider, Error, Result};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const TEST_DIM: usize = 1024;

/// Bag-of-words embedder: texts sharing words get similar vectors.
pub struct WordHashEmbedder {
    pub calls: AtomicUsize,
    /// Fail every call at or after this index
    fail_from: Option<usize>,
}

impl WordHashEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_from: None,
        }
    }

    pub fn failing_from(call: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_from: Some(call),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn word_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; TEST_DIM];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        vector[(hasher.finish() % TEST_DIM as u64) as usize] += 1.0;
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for WordHashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if matches!(self.fail_from, Some(from) if call >= from) {
            return Err(Error::embedding("connection refused"));
        }
        Ok(word_vector(text))
    }

    fn dimensions(&self) -> usize {
        TEST_DIM
    }

    fn name(&self) -> &str {
        "word-hash"
    }
}

/// Synthesizer that records every context it is handed.
pub struct SpySynthesizer {
    answer: String,
    pub contexts: Mutex<Vec<String>>,
    delay: Option<Duration>,
    fail: bool,
}

impl SpySynthesizer {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            contexts: Mutex::new(Vec::new()),
            delay: None,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::answering("")
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::answering("late")
        }
    }

    pub fn calls(&self) -> usize {
        self.contexts.lock().len()
    }

    pub fn last_context(&self) -> Option<String> {
        self.contexts.lock().last().cloned()
    }
}

#[async_trait]
impl AnswerSynthesizer for SpySynthesizer {
    async fn complete(&self, _question: &str, context: &str) -> Result<String> {
        self.contexts.lock().push(context.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(Error::synthesis("model overloaded"));
        }
        Ok(self.answer.clone())
    }

    fn name(&self) -> &str {
        "spy"
    }
}
