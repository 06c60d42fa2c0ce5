//! The message account the core bridge writes for every posted message.

use {
    borsh::{BorshDeserialize, BorshSerialize},
    solana_pubkey::Pubkey,
    thiserror::Error,
};

pub const POSTED_MESSAGE_V1_DISCRIMINATOR: [u8; 3] = *b"msg";

/// Bytes before the length-prefixed payload.
pub const POSTED_MESSAGE_V1_HEADER_LEN: usize = 3 + 1 + 32 + 1 + 3 + 4 + 4 + 8 + 2 + 32 + 4;

/// Finality the token bridge requests for its transfers.
pub const CONSISTENCY_LEVEL_FINALIZED: u8 = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of data: needed {needed} bytes, {remaining} remain")]
    UnexpectedEnd { needed: usize, remaining: usize },
    #[error("invalid discriminator {0:?}")]
    InvalidDiscriminator(Vec<u8>),
    #[error("malformed message account: {0}")]
    Layout(String),
    #[error("unknown transfer payload id {0}")]
    InvalidPayloadId(u8),
    #[error("amount does not fit in 64 bits")]
    AmountOverflow,
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
}

#[repr(u8)]
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[borsh(use_discriminant = true)]
pub enum MessageStatus {
    Published = 0,
    Writing = 1,
    ReadyForPublishing = 2,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostedMessageV1 {
    pub consistency_level: u8,
    pub emitter_authority: Pubkey,
    pub status: MessageStatus,
    pub posted_timestamp: u32,
    pub nonce: u32,
    pub sequence: u64,
    pub emitter_chain: u16,
    pub emitter: Pubkey,
    pub payload: Vec<u8>,
}

/// Account data after the discriminator. The three bytes after the status
/// are unused and always zero.
#[derive(BorshSerialize, BorshDeserialize)]
struct PostedMessageV1Data {
    consistency_level: u8,
    emitter_authority: Pubkey,
    status: MessageStatus,
    _gap: [u8; 3],
    posted_timestamp: u32,
    nonce: u32,
    sequence: u64,
    emitter_chain: u16,
    emitter: Pubkey,
    payload: Vec<u8>,
}

impl From<&PostedMessageV1> for PostedMessageV1Data {
    fn from(message: &PostedMessageV1) -> Self {
        Self {
            consistency_level: message.consistency_level,
            emitter_authority: message.emitter_authority,
            status: message.status,
            _gap: [0; 3],
            posted_timestamp: message.posted_timestamp,
            nonce: message.nonce,
            sequence: message.sequence,
            emitter_chain: message.emitter_chain,
            emitter: message.emitter,
            payload: message.payload.clone(),
        }
    }
}

impl From<PostedMessageV1Data> for PostedMessageV1 {
    fn from(data: PostedMessageV1Data) -> Self {
        Self {
            consistency_level: data.consistency_level,
            emitter_authority: data.emitter_authority,
            status: data.status,
            posted_timestamp: data.posted_timestamp,
            nonce: data.nonce,
            sequence: data.sequence,
            emitter_chain: data.emitter_chain,
            emitter: data.emitter,
            payload: data.payload,
        }
    }
}

impl PostedMessageV1 {
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(POSTED_MESSAGE_V1_HEADER_LEN + self.payload.len());
        data.extend_from_slice(&POSTED_MESSAGE_V1_DISCRIMINATOR);
        PostedMessageV1Data::from(self)
            .serialize(&mut data)
            .expect("serializing into a Vec cannot fail");
        data
    }

    /// Decode message account data. Anything after the payload is
    /// rejected, since the account is sized exactly to its message.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let (discriminator, mut body) =
            data.split_at(POSTED_MESSAGE_V1_DISCRIMINATOR.len().min(data.len()));
        if discriminator != POSTED_MESSAGE_V1_DISCRIMINATOR {
            return Err(DecodeError::InvalidDiscriminator(discriminator.to_vec()));
        }
        let message = PostedMessageV1Data::deserialize(&mut body)
            .map_err(|err| DecodeError::Layout(err.to_string()))?;
        if !body.is_empty() {
            return Err(DecodeError::TrailingBytes(body.len()));
        }
        Ok(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> PostedMessageV1 {
        PostedMessageV1 {
            consistency_level: CONSISTENCY_LEVEL_FINALIZED,
            emitter_authority: Pubkey::new_unique(),
            status: MessageStatus::Published,
            posted_timestamp: 1_700_000_000,
            nonce: 420,
            sequence: 7,
            emitter_chain: crate::SOLANA_CHAIN,
            emitter: Pubkey::new_unique(),
            payload: vec![3, 1, 2, 3],
        }
    }

    #[test]
    fn test_layout_offsets() {
        let msg = message();
        let data = msg.encode();

        assert_eq!(data.len(), POSTED_MESSAGE_V1_HEADER_LEN + 4);
        assert_eq!(&data[..3], b"msg");
        assert_eq!(data[3], 32);
        assert_eq!(&data[4..36], msg.emitter_authority.as_ref());
        assert_eq!(&data[40..44], &1_700_000_000u32.to_le_bytes());
        assert_eq!(&data[44..48], &420u32.to_le_bytes());
        assert_eq!(&data[48..56], &7u64.to_le_bytes());
        assert_eq!(data[36], MessageStatus::Published as u8);
        assert_eq!(&data[37..40], &[0; 3]);
        assert_eq!(&data[56..58], &1u16.to_le_bytes());
        assert_eq!(&data[90..94], &4u32.to_le_bytes());
        assert_eq!(PostedMessageV1::decode(&data).unwrap(), msg);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let mut data = message().encode();
        data[0] = b'x';
        assert!(matches!(
            PostedMessageV1::decode(&data),
            Err(DecodeError::InvalidDiscriminator(_))
        ));

        let data = message().encode();
        assert!(matches!(
            PostedMessageV1::decode(&data[..data.len() - 1]),
            Err(DecodeError::Layout(_))
        ));

        let mut data = message().encode();
        data[36] = 3;
        assert!(matches!(
            PostedMessageV1::decode(&data),
            Err(DecodeError::Layout(_))
        ));

        let mut data = message().encode();
        data.push(0);
        assert_eq!(
            PostedMessageV1::decode(&data),
            Err(DecodeError::TrailingBytes(1))
        );

        assert!(PostedMessageV1::decode(&[]).is_err());
    }
}
