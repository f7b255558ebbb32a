//! Typed message bodies for every operation the relayer sends or receives.
//!
//! Each operation is a variant of a closed enum with its own opcode constant
//! and an explicit encode/decode pair. Bodies are flat big-endian payloads:
//! a 32-bit opcode followed by operation-specific fields. Addresses use the
//! 33-byte wire form (workchain byte + account hash).

use crate::domain::{ChainError, TonAddress};

/// Marker prepended by the subscription contract to forwarded payments.
pub const OP_SUBSCRIPTION_PAYMENT: u32 = 0x7361_6d70;
/// Swap outcome callback to the subscription contract.
pub const OP_SWAP_CALLBACK: u32 = 0x05;
/// Refund of a failed payment, routed through the subscription contract.
pub const OP_REFUND_USER: u32 = 0x06;
/// Jetton burn instruction understood by the jetton wallet.
pub const OP_JETTON_BURN: u32 = 0x595f_07bc;
/// TON-to-jetton swap instruction understood by the venue router.
pub const OP_SWAP: u32 = 0x2593_8561;

/// Body of an outgoing message, one variant per operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundBody {
    /// Report a swap outcome to the subscription contract
    SwapCallback {
        user: TonAddress,
        jetton_amount: i64,
        success: bool,
    },
    /// Return a failed payment's principal to the payer
    RefundUser {
        user: TonAddress,
        amount_nanotons: i64,
    },
    /// Destroy jettons held by the relayer's jetton wallet
    JettonBurn {
        query_id: u64,
        amount: i64,
        /// Receives the excess gas after the burn settles
        response_destination: TonAddress,
    },
    /// Swap TON for jettons at the venue router
    Swap {
        query_id: u64,
        offer_nanotons: i64,
        min_ask_units: i64,
        recipient: TonAddress,
    },
}

impl OutboundBody {
    #[must_use]
    pub fn opcode(&self) -> u32 {
        match self {
            Self::SwapCallback { .. } => OP_SWAP_CALLBACK,
            Self::RefundUser { .. } => OP_REFUND_USER,
            Self::JettonBurn { .. } => OP_JETTON_BURN,
            Self::Swap { .. } => OP_SWAP,
        }
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut w = BodyWriter::new(self.opcode());
        match self {
            Self::SwapCallback {
                user,
                jetton_amount,
                success,
            } => {
                w.write_address(user);
                w.write_u64(*jetton_amount as u64);
                w.write_bool(*success);
            }
            Self::RefundUser {
                user,
                amount_nanotons,
            } => {
                w.write_address(user);
                w.write_u64(*amount_nanotons as u64);
            }
            Self::JettonBurn {
                query_id,
                amount,
                response_destination,
            } => {
                w.write_u64(*query_id);
                w.write_u64(*amount as u64);
                w.write_address(response_destination);
            }
            Self::Swap {
                query_id,
                offer_nanotons,
                min_ask_units,
                recipient,
            } => {
                w.write_u64(*query_id);
                w.write_u64(*offer_nanotons as u64);
                w.write_u64(*min_ask_units as u64);
                w.write_address(recipient);
            }
        }
        w.finish()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ChainError> {
        let mut r = BodyReader::new(bytes);
        let op = r.read_u32()?;
        let body = match op {
            OP_SWAP_CALLBACK => Self::SwapCallback {
                user: r.read_address()?,
                jetton_amount: r.read_u64()? as i64,
                success: r.read_bool()?,
            },
            OP_REFUND_USER => Self::RefundUser {
                user: r.read_address()?,
                amount_nanotons: r.read_u64()? as i64,
            },
            OP_JETTON_BURN => Self::JettonBurn {
                query_id: r.read_u64()?,
                amount: r.read_u64()? as i64,
                response_destination: r.read_address()?,
            },
            OP_SWAP => Self::Swap {
                query_id: r.read_u64()?,
                offer_nanotons: r.read_u64()? as i64,
                min_ask_units: r.read_u64()? as i64,
                recipient: r.read_address()?,
            },
            other => {
                return Err(ChainError::Parse(format!(
                    "unknown outbound opcode: {:#010x}",
                    other
                )));
            }
        };
        r.expect_end()?;
        Ok(body)
    }
}

/// Body of an incoming message the relayer understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPayload {
    /// A subscription payment forwarded by the contract, carrying the paying
    /// user's address
    SubscriptionPayment { user: TonAddress },
}

impl InboundPayload {
    pub fn decode(bytes: &[u8]) -> Result<Self, ChainError> {
        let mut r = BodyReader::new(bytes);
        let op = r.read_u32()?;
        match op {
            OP_SUBSCRIPTION_PAYMENT => {
                let user = r.read_address()?;
                r.expect_end()?;
                Ok(Self::SubscriptionPayment { user })
            }
            other => Err(ChainError::Parse(format!(
                "unknown inbound opcode: {:#010x}",
                other
            ))),
        }
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::SubscriptionPayment { user } => {
                let mut w = BodyWriter::new(OP_SUBSCRIPTION_PAYMENT);
                w.write_address(user);
                w.finish()
            }
        }
    }
}

/// Big-endian payload writer.
pub(crate) struct BodyWriter {
    buf: Vec<u8>,
}

impl BodyWriter {
    pub(crate) fn new(opcode: u32) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&opcode.to_be_bytes());
        Self { buf }
    }

    pub(crate) fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub(crate) fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub(crate) fn write_bool(&mut self, v: bool) {
        self.buf.push(u8::from(v));
    }

    pub(crate) fn write_address(&mut self, addr: &TonAddress) {
        self.buf.extend_from_slice(&addr.to_wire());
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Big-endian payload reader.
pub(crate) struct BodyReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ChainError> {
        if self.pos + n > self.bytes.len() {
            return Err(ChainError::Parse(format!(
                "truncated body: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.bytes.len() - self.pos
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, ChainError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, ChainError> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_be_bytes(arr))
    }

    pub(crate) fn read_bool(&mut self) -> Result<bool, ChainError> {
        match self.take(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ChainError::Parse(format!("invalid bool byte: {}", other))),
        }
    }

    pub(crate) fn read_address(&mut self) -> Result<TonAddress, ChainError> {
        TonAddress::from_wire(self.take(33)?)
    }

    pub(crate) fn expect_end(&self) -> Result<(), ChainError> {
        if self.pos != self.bytes.len() {
            return Err(ChainError::Parse(format!(
                "{} trailing bytes after body",
                self.bytes.len() - self.pos
            )));
        }
        Ok(())
    }
}
