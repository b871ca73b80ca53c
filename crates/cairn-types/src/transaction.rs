//! Transactions: inputs, outputs, spend conditions, and signatures.

use crate::contract::{FileContract, StorageProof};
use crate::crypto::{PublicKey, SignatureBytes};
use crate::encoding::{CodecResult, Decode, Encode, Reader};
use crate::hash::{hash_all, hash_object, CoinAddress, ContractId, Hash256, OutputId, TransactionId};
use crate::{BlockHeight, Currency};

/// The script that unlocks an output: after `timelock`, any
/// `num_signatures` of the listed keys may spend. The hash of this object is
/// the address an output commits to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpendConditions {
    /// Height before which the output cannot be spent.
    pub timelock: BlockHeight,
    /// How many distinct key signatures are required.
    pub num_signatures: u64,
    /// The keys allowed to sign, in committed order.
    pub public_keys: Vec<PublicKey>,
}

impl SpendConditions {
    /// The address form of these conditions.
    pub fn coin_address(&self) -> CoinAddress {
        hash_object(self)
    }
}

/// A reference to an unspent output together with the conditions that claim
/// to unlock it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Input {
    pub output_id: OutputId,
    pub spend_conditions: SpendConditions,
}

/// A quantity of coins locked behind a spend-conditions hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Output {
    pub value: Currency,
    pub spend_hash: CoinAddress,
}

/// One signature over a transaction, tied to a specific input and key.
///
/// The signed message covers every non-signature field plus this
/// signature's own metadata — no signature bytes at all — so co-signers of
/// a multisig input can each sign without seeing the others' signatures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionSignature {
    /// The output ID of the input this signature helps unlock.
    pub input_id: OutputId,
    /// Index into the input's public-key list.
    pub public_key_index: u64,
    /// Height before which this signature is not yet usable.
    pub timelock: BlockHeight,
    /// The raw signature.
    pub signature: SignatureBytes,
}

/// A transfer of value, optionally creating contracts or proving storage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub miner_fees: Vec<Currency>,
    pub file_contracts: Vec<FileContract>,
    pub storage_proofs: Vec<StorageProof>,
    pub signatures: Vec<TransactionSignature>,
}

impl Transaction {
    /// The transaction ID: the hash of the canonical encoding.
    pub fn id(&self) -> TransactionId {
        TransactionId(hash_object(self))
    }

    /// ID of the `i`th output this transaction creates.
    pub fn output_id(&self, i: usize) -> OutputId {
        OutputId(hash_all(&[
            self.id().as_bytes(),
            b"coin output",
            &(i as u64).to_le_bytes(),
        ]))
    }

    /// ID of the `i`th file contract this transaction creates.
    pub fn file_contract_id(&self, i: usize) -> ContractId {
        ContractId(hash_all(&[
            self.id().as_bytes(),
            b"file contract",
            &(i as u64).to_le_bytes(),
        ]))
    }

    /// The message signature `i` must sign: every non-signature field, then
    /// that signature's input ID, key index, and timelock.
    pub fn sig_hash(&self, i: usize) -> Hash256 {
        let sig = &self.signatures[i];
        let mut buf = Vec::new();
        self.inputs.encode_into(&mut buf);
        self.outputs.encode_into(&mut buf);
        self.miner_fees.encode_into(&mut buf);
        self.file_contracts.encode_into(&mut buf);
        self.storage_proofs.encode_into(&mut buf);
        sig.input_id.encode_into(&mut buf);
        sig.public_key_index.encode_into(&mut buf);
        sig.timelock.encode_into(&mut buf);
        crate::hash::hash_bytes(&buf)
    }
}

impl Encode for SpendConditions {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.timelock.encode_into(buf);
        self.num_signatures.encode_into(buf);
        self.public_keys.encode_into(buf);
    }
}

impl Decode for SpendConditions {
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(SpendConditions {
            timelock: BlockHeight::decode_from(r)?,
            num_signatures: u64::decode_from(r)?,
            public_keys: Vec::<PublicKey>::decode_from(r)?,
        })
    }
}

impl Encode for Input {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.output_id.encode_into(buf);
        self.spend_conditions.encode_into(buf);
    }
}

impl Decode for Input {
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Input {
            output_id: OutputId::decode_from(r)?,
            spend_conditions: SpendConditions::decode_from(r)?,
        })
    }
}

impl Encode for Output {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.value.encode_into(buf);
        self.spend_hash.encode_into(buf);
    }
}

impl Decode for Output {
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Output {
            value: Currency::decode_from(r)?,
            spend_hash: CoinAddress::decode_from(r)?,
        })
    }
}

impl Encode for TransactionSignature {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.input_id.encode_into(buf);
        self.public_key_index.encode_into(buf);
        self.timelock.encode_into(buf);
        self.signature.encode_into(buf);
    }
}

impl Decode for TransactionSignature {
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(TransactionSignature {
            input_id: OutputId::decode_from(r)?,
            public_key_index: u64::decode_from(r)?,
            timelock: BlockHeight::decode_from(r)?,
            signature: SignatureBytes::decode_from(r)?,
        })
    }
}

impl Encode for Transaction {
    fn encode_into(&self, buf: &mut Vec<u8>) {
        self.inputs.encode_into(buf);
        self.outputs.encode_into(buf);
        self.miner_fees.encode_into(buf);
        self.file_contracts.encode_into(buf);
        self.storage_proofs.encode_into(buf);
        self.signatures.encode_into(buf);
    }
}

impl Decode for Transaction {
    fn decode_from(r: &mut Reader<'_>) -> CodecResult<Self> {
        Ok(Transaction {
            inputs: Vec::<Input>::decode_from(r)?,
            outputs: Vec::<Output>::decode_from(r)?,
            miner_fees: Vec::<Currency>::decode_from(r)?,
            file_contracts: Vec::<FileContract>::decode_from(r)?,
            storage_proofs: Vec::<StorageProof>::decode_from(r)?,
            signatures: Vec::<TransactionSignature>::decode_from(r)?,
        })
    }
}
