use std::fmt::{self, Display};
use std::str::FromStr;

/// Inscription identifier of the form `<txid>i<index>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InscriptionId {
    pub txid: String,
    pub index: u32,
}

impl InscriptionId {
    pub fn new(txid: &str, index: u32) -> Self {
        Self {
            txid: txid.to_string(),
            index,
        }
    }
}

impl Display for InscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}i{}", self.txid, self.index)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseInscriptionIdError {
    MissingSeparator,
    BadTxid,
    BadIndex,
}

impl Display for ParseInscriptionIdError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MissingSeparator => write!(f, "missing 'i' separator"),
            Self::BadTxid => write!(f, "txid is not 64 hex characters"),
            Self::BadIndex => write!(f, "index is not an unsigned integer"),
        }
    }
}

impl std::error::Error for ParseInscriptionIdError {}

impl FromStr for InscriptionId {
    type Err = ParseInscriptionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid, index) = s
            .rsplit_once('i')
            .ok_or(ParseInscriptionIdError::MissingSeparator)?;
        if txid.len() != 64 || !txid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseInscriptionIdError::BadTxid);
        }
        let index = index
            .parse::<u32>()
            .map_err(|_| ParseInscriptionIdError::BadIndex)?;
        Ok(InscriptionId {
            txid: txid.to_string(),
            index,
        })
    }
}
