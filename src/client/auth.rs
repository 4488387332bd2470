//! Wallet signing for the exchange protocol
//!
//! Implements the EIP-712 typed-data signatures the venue expects:
//! the one-time ClobAuth attestation used to issue API credentials and
//! the per-order signature over the exchange Order struct. Both are
//! hashed manually (domain separator + struct hash) so no ABI machinery
//! is needed.

use crate::error::{AgentError, Result};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;

// ClobAuth domain (credential issuance)
const AUTH_DOMAIN_NAME: &str = "ClobAuthDomain";
const AUTH_DOMAIN_VERSION: &str = "1";
/// Static attestation string the venue requires verbatim
pub const AUTH_MESSAGE: &str = "This message attests that I control the given wallet";

// Order domain (trade settlement)
const EXCHANGE_DOMAIN_NAME: &str = "Polymarket CTF Exchange";
const EXCHANGE_DOMAIN_VERSION: &str = "1";

/// Primary exchange contract
const CTF_EXCHANGE: &str = "0x4bFb41d5B3570DeFd03C39a9A4D8dE6Bd8B8982E";
/// Risk-isolated exchange for markets with correlated outcome risk
const NEG_RISK_CTF_EXCHANGE: &str = "0xC5d563A36AE78145C45a50134d48A1215220f80a";

/// Execution venue. Markets flagged neg-risk settle through a separate
/// contract with its own signing domain and approvals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Venue {
    Exchange,
    NegRiskExchange,
}

impl Venue {
    pub fn from_neg_risk(neg_risk: bool) -> Self {
        if neg_risk {
            Venue::NegRiskExchange
        } else {
            Venue::Exchange
        }
    }

    /// Verifying contract for this venue's EIP-712 domain
    pub fn verifying_contract(&self) -> Address {
        let addr = match self {
            Venue::Exchange => CTF_EXCHANGE,
            Venue::NegRiskExchange => NEG_RISK_CTF_EXCHANGE,
        };
        // Compile-time constants, always valid hex
        addr.parse().unwrap()
    }
}

/// Fields of the exchange Order struct in signing order
#[derive(Debug, Clone)]
pub struct OrderSigningData {
    pub salt: U256,
    pub maker: Address,
    pub signer: Address,
    pub taker: Address,
    pub token_id: U256,
    pub maker_amount: U256,
    pub taker_amount: U256,
    pub expiration: U256,
    pub nonce: U256,
    pub fee_rate_bps: U256,
    pub side: u8,
    pub signature_type: u8,
}

/// Signer wrapping the agent's trading wallet
#[derive(Clone)]
pub struct WalletSigner {
    wallet: LocalWallet,
    chain_id: u64,
}

impl WalletSigner {
    /// Build from a hex private key (0x prefix optional)
    pub fn from_private_key(private_key: &str, chain_id: u64) -> Result<Self> {
        let key_hex = private_key.trim_start_matches("0x");
        let wallet: LocalWallet = key_hex
            .parse()
            .map_err(|e| AgentError::Signing(format!("Invalid private key: {}", e)))?;
        let wallet = wallet.with_chain_id(chain_id);

        Ok(Self { wallet, chain_id })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Lowercase hex address, as the venue expects it in headers
    pub fn address_hex(&self) -> String {
        format!("{:?}", self.wallet.address())
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn sign_digest(&self, digest: H256) -> Result<String> {
        let signature = self
            .wallet
            .sign_hash(digest)
            .map_err(|e| AgentError::Signing(format!("Signing failed: {}", e)))?;
        Ok(format!("0x{}", hex::encode(signature.to_vec())))
    }

    /// Sign the ClobAuth attestation used to create or derive API
    /// credentials. The struct binds address, a stringified Unix
    /// timestamp, a nonce, and the static attestation message.
    pub fn sign_auth_attestation(&self, timestamp: i64, nonce: u64) -> Result<String> {
        let domain_type_hash =
            keccak256(b"EIP712Domain(string name,string version,uint256 chainId)");
        let mut domain_data = Vec::new();
        domain_data.extend_from_slice(&domain_type_hash);
        domain_data.extend_from_slice(&keccak256(AUTH_DOMAIN_NAME.as_bytes()));
        domain_data.extend_from_slice(&keccak256(AUTH_DOMAIN_VERSION.as_bytes()));
        domain_data.extend_from_slice(&u256_to_bytes32(U256::from(self.chain_id)));
        let domain_separator = keccak256(&domain_data);

        let struct_type_hash = keccak256(
            b"ClobAuth(address address,string timestamp,uint256 nonce,string message)",
        );
        let mut struct_data = Vec::new();
        struct_data.extend_from_slice(&struct_type_hash);
        struct_data.extend_from_slice(&address_to_bytes32(self.wallet.address()));
        struct_data.extend_from_slice(&keccak256(timestamp.to_string().as_bytes()));
        struct_data.extend_from_slice(&u256_to_bytes32(U256::from(nonce)));
        struct_data.extend_from_slice(&keccak256(AUTH_MESSAGE.as_bytes()));
        let struct_hash = keccak256(&struct_data);

        self.sign_digest(eip712_digest(domain_separator, struct_hash))
    }

    /// Sign an exchange order against the given venue's domain
    pub fn sign_order(&self, order: &OrderSigningData, venue: Venue) -> Result<String> {
        let domain_separator = self.order_domain_separator(venue);
        let struct_hash = order_struct_hash(order);
        self.sign_digest(eip712_digest(domain_separator, struct_hash))
    }

    fn order_domain_separator(&self, venue: Venue) -> [u8; 32] {
        let type_hash = keccak256(
            b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
        );
        let mut data = Vec::new();
        data.extend_from_slice(&type_hash);
        data.extend_from_slice(&keccak256(EXCHANGE_DOMAIN_NAME.as_bytes()));
        data.extend_from_slice(&keccak256(EXCHANGE_DOMAIN_VERSION.as_bytes()));
        data.extend_from_slice(&u256_to_bytes32(U256::from(self.chain_id)));
        data.extend_from_slice(&address_to_bytes32(venue.verifying_contract()));
        keccak256(&data)
    }
}

fn order_struct_hash(order: &OrderSigningData) -> [u8; 32] {
    let type_hash = keccak256(
        b"Order(uint256 salt,address maker,address signer,address taker,uint256 tokenId,uint256 makerAmount,uint256 takerAmount,uint256 expiration,uint256 nonce,uint256 feeRateBps,uint8 side,uint8 signatureType)",
    );

    let mut data = Vec::new();
    data.extend_from_slice(&type_hash);
    data.extend_from_slice(&u256_to_bytes32(order.salt));
    data.extend_from_slice(&address_to_bytes32(order.maker));
    data.extend_from_slice(&address_to_bytes32(order.signer));
    data.extend_from_slice(&address_to_bytes32(order.taker));
    data.extend_from_slice(&u256_to_bytes32(order.token_id));
    data.extend_from_slice(&u256_to_bytes32(order.maker_amount));
    data.extend_from_slice(&u256_to_bytes32(order.taker_amount));
    data.extend_from_slice(&u256_to_bytes32(order.expiration));
    data.extend_from_slice(&u256_to_bytes32(order.nonce));
    data.extend_from_slice(&u256_to_bytes32(order.fee_rate_bps));
    data.extend_from_slice(&u256_to_bytes32(U256::from(order.side)));
    data.extend_from_slice(&u256_to_bytes32(U256::from(order.signature_type)));
    keccak256(&data)
}

fn eip712_digest(domain_separator: [u8; 32], struct_hash: [u8; 32]) -> H256 {
    let mut data = vec![0x19, 0x01];
    data.extend_from_slice(&domain_separator);
    data.extend_from_slice(&struct_hash);
    H256::from(keccak256(&data))
}

fn u256_to_bytes32(value: U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    bytes
}

fn address_to_bytes32(addr: Address) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes[12..].copy_from_slice(addr.as_bytes());
    bytes
}
