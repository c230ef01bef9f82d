//! EIP-3009 signing for x402 payments

use ethers::core::k256::ecdsa::SigningKey;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;
use std::time::{SystemTime, UNIX_EPOCH};

use super::types::*;

/// Authorizations stay valid for an hour after signing
const AUTHORIZATION_VALIDITY_SECS: u64 = 3600;

/// x402 payment signer using a local wallet
pub struct X402Signer {
    wallet: LocalWallet,
}

impl X402Signer {
    /// Create a new signer from a private key (hex string with or without 0x prefix)
    pub fn new(private_key: &str) -> Result<Self, String> {
        let key_hex = private_key.strip_prefix("0x").unwrap_or(private_key);
        let key_bytes = hex::decode(key_hex)
            .map_err(|e| format!("Invalid private key hex: {}", e))?;

        if key_bytes.len() != 32 {
            return Err(format!(
                "Invalid private key: expected 32 bytes, got {}",
                key_bytes.len()
            ));
        }

        let signing_key = SigningKey::from_bytes(key_bytes.as_slice().into())
            .map_err(|e| format!("Invalid private key: {}", e))?;

        let wallet = LocalWallet::from(signing_key).with_chain_id(BASE_CHAIN_ID);

        Ok(Self { wallet })
    }

    /// Get the wallet address
    pub fn address(&self) -> String {
        format!("{:?}", self.wallet.address()).to_lowercase()
    }

    fn generate_nonce() -> Result<H256, String> {
        let mut bytes = [0u8; 32];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| format!("Failed to generate payment nonce: {}", e))?;
        Ok(H256::from(keccak256(bytes)))
    }

    /// Sign an EIP-3009 TransferWithAuthorization for the given requirement.
    ///
    /// The payload shape follows `x402_version`: v1 puts scheme/network at the
    /// top level, v2 echoes the accepted requirement.
    pub async fn sign_payment(
        &self,
        requirements: &PaymentRequirements,
        x402_version: u8,
    ) -> Result<PaymentPayload, String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| format!("Time error: {}", e))?;
        let valid_before = now.as_secs() + AUTHORIZATION_VALIDITY_SECS;

        let nonce = Self::generate_nonce()?;

        let domain = Eip712Domain::for_requirements(requirements)?;
        let message = TransferWithAuthorizationMessage {
            from: self.wallet.address(),
            to: requirements.pay_to.parse()
                .map_err(|e| format!("Invalid pay_to address: {}", e))?,
            value: U256::from_dec_str(&requirements.max_amount_required)
                .map_err(|e| format!("Invalid amount: {}", e))?,
            valid_after: U256::zero(),
            valid_before: U256::from(valid_before),
            nonce,
        };

        let signature = self.sign_typed_data(&domain, &message)?;

        let authorization = Eip3009Authorization {
            from: self.address(),
            to: requirements.pay_to.to_lowercase(),
            value: requirements.max_amount_required.clone(),
            valid_after: "0".to_string(),
            valid_before: valid_before.to_string(),
            nonce: format!("{:?}", nonce),
        };

        let payload = ExactEvmPayload {
            signature,
            authorization,
        };

        if x402_version < 2 {
            return Ok(PaymentPayload {
                x402_version,
                scheme: Some(requirements.scheme.clone()),
                network: Some(requirements.network.clone()),
                accepted: None,
                payload,
            });
        }

        Ok(PaymentPayload {
            x402_version,
            scheme: None,
            network: None,
            accepted: Some(AcceptedPayment {
                scheme: requirements.scheme.clone(),
                network: requirements.network.clone(),
                amount: requirements.max_amount_required.clone(),
                pay_to: requirements.pay_to.clone(),
                max_timeout_seconds: requirements.max_timeout_seconds.max(60),
                asset: requirements.asset.clone(),
            }),
            payload,
        })
    }

    fn sign_typed_data(
        &self,
        domain: &Eip712Domain,
        message: &TransferWithAuthorizationMessage,
    ) -> Result<String, String> {
        let digest = typed_data_digest(domain, message);

        let signature = self.wallet
            .sign_hash(digest)
            .map_err(|e| format!("Failed to sign: {}", e))?;

        Ok(format!("0x{}", hex::encode(signature.to_vec())))
    }
}

/// keccak256("\x19\x01" ++ domainSeparator ++ structHash)
fn typed_data_digest(domain: &Eip712Domain, message: &TransferWithAuthorizationMessage) -> H256 {
    let mut to_sign = Vec::with_capacity(66);
    to_sign.push(0x19);
    to_sign.push(0x01);
    to_sign.extend_from_slice(domain.separator().as_bytes());
    to_sign.extend_from_slice(message.struct_hash().as_bytes());
    H256::from(keccak256(&to_sign))
}

/// EIP-712 domain of the token contract being transferred
struct Eip712Domain {
    name: String,
    version: String,
    chain_id: u64,
    verifying_contract: Address,
}

impl Eip712Domain {
    fn for_requirements(requirements: &PaymentRequirements) -> Result<Self, String> {
        Ok(Self {
            name: requirements.token_name().to_string(),
            version: requirements.token_version().to_string(),
            chain_id: requirements.chain_id()?,
            verifying_contract: requirements.asset.parse()
                .map_err(|e| format!("Invalid asset address: {}", e))?,
        })
    }

    fn separator(&self) -> H256 {
        let type_hash = keccak256(
            b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)"
        );

        let encoded = ethers::abi::encode(&[
            ethers::abi::Token::FixedBytes(type_hash.to_vec()),
            ethers::abi::Token::FixedBytes(keccak256(self.name.as_bytes()).to_vec()),
            ethers::abi::Token::FixedBytes(keccak256(self.version.as_bytes()).to_vec()),
            ethers::abi::Token::Uint(U256::from(self.chain_id)),
            ethers::abi::Token::Address(self.verifying_contract),
        ]);

        H256::from(keccak256(&encoded))
    }
}

/// TransferWithAuthorization message for EIP-3009
struct TransferWithAuthorizationMessage {
    from: Address,
    to: Address,
    value: U256,
    valid_after: U256,
    valid_before: U256,
    nonce: H256,
}

impl TransferWithAuthorizationMessage {
    fn struct_hash(&self) -> H256 {
        let type_hash = keccak256(
            b"TransferWithAuthorization(address from,address to,uint256 value,uint256 validAfter,uint256 validBefore,bytes32 nonce)"
        );

        let encoded = ethers::abi::encode(&[
            ethers::abi::Token::FixedBytes(type_hash.to_vec()),
            ethers::abi::Token::Address(self.from),
            ethers::abi::Token::Address(self.to),
            ethers::abi::Token::Uint(self.value),
            ethers::abi::Token::Uint(self.valid_after),
            ethers::abi::Token::Uint(self.valid_before),
            ethers::abi::Token::FixedBytes(self.nonce.as_bytes().to_vec()),
        ]);

        H256::from(keccak256(&encoded))
    }
}
