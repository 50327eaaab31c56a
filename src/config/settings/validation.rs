// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{ContextError, Result};

use super::ContextConfig;

impl ContextConfig {
    /// Reject settings that would break ranking or budgeting.
    pub fn validate(&self) -> Result<()> {
        let retrieval = &self.retrieval;

        if retrieval.default_level > 3 {
            return Err(ContextError::Config(format!(
                "retrieval.default_level must be 0-3, got {}",
                retrieval.default_level
            )));
        }

        // Expanded candidates must never outrank the seed that reached them.
        let mut previous = 1.0;
        for factor in retrieval
            .hop_decay
            .iter()
            .chain(std::iter::once(&retrieval.decay_floor))
        {
            if !(*factor > 0.0 && *factor <= previous) {
                return Err(ContextError::Config(format!(
                    "retrieval.hop_decay must be positive and non-increasing, got {:?} then {}",
                    retrieval.hop_decay, retrieval.decay_floor
                )));
            }
            previous = *factor;
        }

        if !(retrieval.incoming_factor > 0.0 && retrieval.incoming_factor <= 1.0) {
            return Err(ContextError::Config(format!(
                "retrieval.incoming_factor must be in (0, 1], got {}",
                retrieval.incoming_factor
            )));
        }

        if retrieval.fts_limit == 0 {
            return Err(ContextError::Config(
                "retrieval.fts_limit must be at least 1".to_string(),
            ));
        }

        for pattern in &self.chunker.ignore_patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                ContextError::Config(format!("Invalid ignore pattern '{}': {}", pattern, e))
            })?;
        }

        Ok(())
    }
}
