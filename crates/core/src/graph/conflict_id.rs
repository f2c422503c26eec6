#![forbid(unsafe_code)]

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConflictId(String);

impl ConflictId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, ConflictIdError> {
        let value = value.into();
        validate_conflict_id(&value)?;
        Ok(Self(value.trim().to_string()))
    }

    /// Stable id of the (change, conflicting change) pair.
    pub fn for_pair(change_id: &str, conflicting_change_id: &str) -> Self {
        const FNV_OFFSET: u64 = 14695981039346656037;
        const FNV_PRIME: u64 = 1099511628211;

        fn update_str(hash: &mut u64, value: &str) {
            for b in value.as_bytes() {
                *hash ^= *b as u64;
                *hash = hash.wrapping_mul(FNV_PRIME);
            }
            *hash ^= 0xff;
            *hash = hash.wrapping_mul(FNV_PRIME);
        }

        let mut h1 = FNV_OFFSET;
        let mut h2 = FNV_OFFSET ^ 0x9e3779b97f4a7c15;
        for (hash, offset) in [(&mut h1, 0u8), (&mut h2, 1u8)] {
            update_str(hash, change_id);
            update_str(hash, conflicting_change_id);
            *hash ^= offset as u64;
            *hash = hash.wrapping_mul(FNV_PRIME);
        }

        Self(format!("CONFLICT-{h1:016x}{h2:016x}"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConflictIdError {
    Empty,
    InvalidFormat,
}

impl ConflictIdError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "conflict_id must not be empty",
            Self::InvalidFormat => "conflict_id must match CONFLICT-[0-9a-f]{32}",
        }
    }
}

fn validate_conflict_id(value: &str) -> Result<(), ConflictIdError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConflictIdError::Empty);
    }
    let Some(hex) = trimmed.strip_prefix("CONFLICT-") else {
        return Err(ConflictIdError::InvalidFormat);
    };
    if hex.len() != 32 {
        return Err(ConflictIdError::InvalidFormat);
    }
    if !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(ConflictIdError::InvalidFormat);
    }
    Ok(())
}
