//! Token bridge payloads carried inside posted messages. Big-endian.

use crate::message::DecodeError;

pub const TRANSFER_ID: u8 = 1;
pub const TRANSFER_WITH_PAYLOAD_ID: u8 = 3;

/// Payload id 1: a plain transfer with a relayer fee.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub amount: u64,
    pub token_address: [u8; 32],
    pub token_chain: u16,
    pub recipient: [u8; 32],
    pub recipient_chain: u16,
    pub relayer_fee: u64,
}

/// Payload id 3: a transfer with an arbitrary payload for the redeemer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferWithPayload {
    pub amount: u64,
    pub token_address: [u8; 32],
    pub token_chain: u16,
    pub redeemer: [u8; 32],
    pub redeemer_chain: u16,
    pub sender: [u8; 32],
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenBridgeMessage {
    Transfer(Transfer),
    TransferWithPayload(TransferWithPayload),
}

impl TokenBridgeMessage {
    pub fn amount(&self) -> u64 {
        match self {
            Self::Transfer(transfer) => transfer.amount,
            Self::TransferWithPayload(transfer) => transfer.amount,
        }
    }

    pub fn token_address(&self) -> &[u8; 32] {
        match self {
            Self::Transfer(transfer) => &transfer.token_address,
            Self::TransferWithPayload(transfer) => &transfer.token_address,
        }
    }

    pub fn token_chain(&self) -> u16 {
        match self {
            Self::Transfer(transfer) => transfer.token_chain,
            Self::TransferWithPayload(transfer) => transfer.token_chain,
        }
    }

    /// The recipient, or the redeemer of a transfer with payload.
    pub fn recipient(&self) -> &[u8; 32] {
        match self {
            Self::Transfer(transfer) => &transfer.recipient,
            Self::TransferWithPayload(transfer) => &transfer.redeemer,
        }
    }

    pub fn recipient_chain(&self) -> u16 {
        match self {
            Self::Transfer(transfer) => transfer.recipient_chain,
            Self::TransferWithPayload(transfer) => transfer.redeemer_chain,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::new();
        match self {
            Self::Transfer(transfer) => {
                data.push(TRANSFER_ID);
                write_u256(&mut data, transfer.amount);
                data.extend_from_slice(&transfer.token_address);
                data.extend_from_slice(&transfer.token_chain.to_be_bytes());
                data.extend_from_slice(&transfer.recipient);
                data.extend_from_slice(&transfer.recipient_chain.to_be_bytes());
                write_u256(&mut data, transfer.relayer_fee);
            }
            Self::TransferWithPayload(transfer) => {
                data.push(TRANSFER_WITH_PAYLOAD_ID);
                write_u256(&mut data, transfer.amount);
                data.extend_from_slice(&transfer.token_address);
                data.extend_from_slice(&transfer.token_chain.to_be_bytes());
                data.extend_from_slice(&transfer.redeemer);
                data.extend_from_slice(&transfer.redeemer_chain.to_be_bytes());
                data.extend_from_slice(&transfer.sender);
                data.extend_from_slice(&transfer.payload);
            }
        }
        data
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = Cursor::new(data);
        match cursor.u8()? {
            TRANSFER_ID => {
                let transfer = Transfer {
                    amount: read_u256(&mut cursor)?,
                    token_address: cursor.array()?,
                    token_chain: u16::from_be_bytes(cursor.array()?),
                    recipient: cursor.array()?,
                    recipient_chain: u16::from_be_bytes(cursor.array()?),
                    relayer_fee: read_u256(&mut cursor)?,
                };
                cursor.finish()?;
                Ok(Self::Transfer(transfer))
            }
            TRANSFER_WITH_PAYLOAD_ID => Ok(Self::TransferWithPayload(TransferWithPayload {
                amount: read_u256(&mut cursor)?,
                token_address: cursor.array()?,
                token_chain: u16::from_be_bytes(cursor.array()?),
                redeemer: cursor.array()?,
                redeemer_chain: u16::from_be_bytes(cursor.array()?),
                sender: cursor.array()?,
                payload: cursor.rest().to_vec(),
            })),
            other => Err(DecodeError::InvalidPayloadId(other)),
        }
    }
}

fn write_u256(data: &mut Vec<u8>, value: u64) {
    data.extend_from_slice(&[0u8; 24]);
    data.extend_from_slice(&value.to_be_bytes());
}

fn read_u256(cursor: &mut Cursor<'_>) -> Result<u64, DecodeError> {
    let high = cursor.take(24)?;
    if high.iter().any(|byte| *byte != 0) {
        return Err(DecodeError::AmountOverflow);
    }
    Ok(u64::from_be_bytes(cursor.array()?))
}

struct Cursor<'a> {
    data: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.data.len() < len {
            return Err(DecodeError::UnexpectedEnd {
                needed: len,
                remaining: self.data.len(),
            });
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.data)
    }

    fn finish(&self) -> Result<(), DecodeError> {
        match self.data.len() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}
