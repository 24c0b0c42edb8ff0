//! Canonical request and callback signing.
//!
//! Every request sent to the upstream API and every callback it sends back is
//! authenticated the same way: the fields are put into a canonical order,
//! joined as `key=value` pairs with `&`, the shared secret is appended with no
//! separator, and the MD5 digest of the result is rendered as 32 lowercase hex
//! characters.
//!
//! Two canonicalizations exist in the wild and they disagree when one key is a
//! prefix of another followed by a byte lower than `=` (e.g. `amount` and
//! `amount1`), or when a value is empty. Adapters must declare which one their
//! upstream expects; see [`Canonicalization`].
//!
//! The signature carries no nonce or timestamp, so it offers no replay
//! protection. Hosts must credit at most once per upstream transaction id.

use crate::types::{OrderRequest, SIGNATURE_FIELD};
use md5::{Digest, Md5};
use std::collections::BTreeMap;

/// How a parameter set is put into canonical order before hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Canonicalization {
    /// Sort by key (byte order) and skip fields whose value is empty.
    #[default]
    SortByKey,

    /// Render every field as `key=value`, then sort the rendered strings
    /// (byte order). Empty values are kept as `key=`.
    SortByKeyValuePair,
}

/// A set of fields to be signed.
///
/// Keys are held in byte-wise ascending order. The `signature` field is never
/// a member: inserting it is a no-op.
///
/// # Examples
///
/// ```
/// use upay_rs::signing::SignableParams;
///
/// let params: SignableParams = [("b", "2"), ("a", "1"), ("signature", "x")]
///     .into_iter()
///     .collect();
///
/// assert_eq!(params.len(), 2);
/// assert_eq!(params.keys().collect::<Vec<_>>(), vec!["a", "b"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignableParams {
    fields: BTreeMap<String, String>,
}

impl SignableParams {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a field. `signature` is ignored.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if key == SIGNATURE_FIELD {
            return;
        }
        self.fields.insert(key, value.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.fields.remove(key)
    }

    /// Looks up a field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Returns true if the field is present.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in canonical key order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Fields in canonical key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for SignableParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = SignableParams::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl From<&OrderRequest> for SignableParams {
    fn from(order: &OrderRequest) -> Self {
        let mut params = SignableParams::new()
            .with("order_id", order.order_id.as_str())
            .with("amount", order.amount_text())
            .with("notify_url", order.notify_url.as_str())
            .with("redirect_url", order.redirect_url.as_str());
        if let Some(payment_type) = &order.payment_type {
            params.insert("type", payment_type.as_str());
        }
        params
    }
}

/// Builds the canonical string for `params`, without the secret.
///
/// # Examples
///
/// ```
/// use upay_rs::signing::{canonical_string, Canonicalization, SignableParams};
///
/// let params = SignableParams::new()
///     .with("order_id", "1001")
///     .with("amount", "10.50")
///     .with("memo", "");
///
/// assert_eq!(
///     canonical_string(&params, Canonicalization::SortByKey),
///     "amount=10.50&order_id=1001"
/// );
/// ```
pub fn canonical_string(params: &SignableParams, variant: Canonicalization) -> String {
    match variant {
        Canonicalization::SortByKey => params
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&"),
        Canonicalization::SortByKeyValuePair => {
            let mut pairs: Vec<String> = params
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect();
            pairs.sort();
            pairs.join("&")
        }
    }
}

/// Signs a parameter set with the shared secret.
pub fn sign_params(params: &SignableParams, secret: &str, variant: Canonicalization) -> String {
    let mut message = canonical_string(params, variant);
    message.push_str(secret);
    md5_hex(message.as_bytes())
}

/// Signs any collection of `(key, value)` pairs with the shared secret.
///
/// A `signature` entry in the input is ignored, and input order does not matter.
///
/// # Examples
///
/// ```
/// use upay_rs::signing::{sign, Canonicalization};
///
/// let signature = sign(
///     [
///         ("order_id", "1001"),
///         ("amount", "10.50"),
///         ("type", "USDT-TRC20"),
///         ("notify_url", "https://x/n"),
///         ("redirect_url", "https://x/r"),
///     ],
///     "k1",
///     Canonicalization::SortByKey,
/// );
/// assert_eq!(signature, "4c0d75ac31699781c1b8f5cb78890544");
/// ```
pub fn sign<I, K, V>(fields: I, secret: &str, variant: Canonicalization) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let params: SignableParams = fields.into_iter().collect();
    sign_params(&params, secret, variant)
}

/// Signs an order request.
pub fn sign_order(order: &OrderRequest, secret: &str, variant: Canonicalization) -> String {
    sign_params(&SignableParams::from(order), secret, variant)
}

/// Checks a claimed signature against the one recomputed from `params`.
///
/// The digests are compared as plain strings.
pub fn verify_signature(
    params: &SignableParams,
    secret: &str,
    claimed: &str,
    variant: Canonicalization,
) -> bool {
    sign_params(params, secret, variant) == claimed
}

fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector_fields() -> Vec<(&'static str, &'static str)> {
        vec![
            ("order_id", "1001"),
            ("amount", "10.50"),
            ("type", "USDT-TRC20"),
            ("notify_url", "https://x/n"),
            ("redirect_url", "https://x/r"),
        ]
    }

    #[test]
    fn test_concrete_vector() {
        let params: SignableParams = vector_fields().into_iter().collect();
        let canonical = canonical_string(&params, Canonicalization::SortByKey);
        assert_eq!(
            format!("{}k1", canonical),
            "amount=10.50&notify_url=https://x/n&order_id=1001&redirect_url=https://x/r&type=USDT-TRC20k1"
        );

        let signature = sign_params(&params, "k1", Canonicalization::SortByKey);
        assert_eq!(signature, "4c0d75ac31699781c1b8f5cb78890544");
        assert_eq!(signature.len(), 32);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_deterministic() {
        let a = sign(vector_fields(), "k1", Canonicalization::SortByKey);
        let b = sign(vector_fields(), "k1", Canonicalization::SortByKey);
        assert_eq!(a, b);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut reversed = vector_fields();
        reversed.reverse();
        let mut rotated = vector_fields();
        rotated.rotate_left(2);

        let expected = sign(vector_fields(), "k1", Canonicalization::SortByKey);
        assert_eq!(sign(reversed, "k1", Canonicalization::SortByKey), expected);
        assert_eq!(sign(rotated.clone(), "k1", Canonicalization::SortByKey), expected);

        let expected = sign(vector_fields(), "k1", Canonicalization::SortByKeyValuePair);
        assert_eq!(sign(rotated, "k1", Canonicalization::SortByKeyValuePair), expected);
    }

    #[test]
    fn test_empty_values_are_omitted() {
        let mut with_empty = vector_fields();
        with_empty.push(("memo", ""));

        assert_eq!(
            sign(with_empty, "k1", Canonicalization::SortByKey),
            sign(vector_fields(), "k1", Canonicalization::SortByKey)
        );
    }

    #[test]
    fn test_signature_field_is_never_signed() {
        let mut with_signature = vector_fields();
        with_signature.push(("signature", "deadbeef"));

        assert_eq!(
            sign(with_signature, "k1", Canonicalization::SortByKey),
            "4c0d75ac31699781c1b8f5cb78890544"
        );
    }

    #[test]
    fn test_tampering_changes_signature() {
        let baseline = sign(vector_fields(), "k1", Canonicalization::SortByKey);

        let fields: Vec<(String, String)> = vector_fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        for index in 0..fields.len() {
            let mut tampered = fields.clone();
            tampered[index].1.push('0');
            assert_ne!(
                sign(tampered, "k1", Canonicalization::SortByKey),
                baseline,
                "tampering with {} went unnoticed",
                fields[index].0
            );
        }

        assert_ne!(sign(vector_fields(), "k2", Canonicalization::SortByKey), baseline);
    }

    #[test]
    fn test_numeric_text_is_not_normalized() {
        let whole = sign([("amount", "100")], "k1", Canonicalization::SortByKey);
        let decimal = sign([("amount", "100.0")], "k1", Canonicalization::SortByKey);
        assert_ne!(whole, decimal);

        let trimmed = sign(
            [("amount", "10.5"), ("order_id", "1001")],
            "k1",
            Canonicalization::SortByKey,
        );
        let padded = sign(
            [("amount", "10.50"), ("order_id", "1001")],
            "k1",
            Canonicalization::SortByKey,
        );
        assert_ne!(trimmed, padded);
    }

    #[test]
    fn test_keys_sort_by_byte_value() {
        let params: SignableParams = [("b", "1"), ("B", "2"), ("a", "3"), ("A", "4")]
            .into_iter()
            .collect();
        assert_eq!(
            canonical_string(&params, Canonicalization::SortByKey),
            "A=4&B=2&a=3&b=1"
        );
        assert_ne!(
            sign([("Amount", "1")], "k", Canonicalization::SortByKey),
            sign([("amount", "1")], "k", Canonicalization::SortByKey)
        );
    }

    #[test]
    fn test_variants_diverge_on_prefix_keys() {
        let params: SignableParams = [("amount", "1"), ("amount1", "2")].into_iter().collect();

        assert_eq!(
            canonical_string(&params, Canonicalization::SortByKey),
            "amount=1&amount1=2"
        );
        assert_eq!(
            canonical_string(&params, Canonicalization::SortByKeyValuePair),
            "amount1=2&amount=1"
        );
        assert_ne!(
            sign_params(&params, "s", Canonicalization::SortByKey),
            sign_params(&params, "s", Canonicalization::SortByKeyValuePair)
        );
    }

    #[test]
    fn test_pair_variant_keeps_empty_values() {
        let params: SignableParams = [("a", "1"), ("b", "")].into_iter().collect();
        assert_eq!(
            canonical_string(&params, Canonicalization::SortByKeyValuePair),
            "a=1&b="
        );
    }

    #[test]
    fn test_variants_agree_on_order_fields() {
        let params: SignableParams = vector_fields().into_iter().collect();
        assert_eq!(
            canonical_string(&params, Canonicalization::SortByKey),
            canonical_string(&params, Canonicalization::SortByKeyValuePair)
        );
    }

    #[test]
    fn test_empty_set_signs_secret_only() {
        assert_eq!(
            sign_params(&SignableParams::new(), "k1", Canonicalization::SortByKey),
            "b637b17af08aced8850c18cccde915da"
        );
    }

    #[test]
    fn test_order_request_signing() {
        let order = OrderRequest::new("1001", 10.5, "USDT-TRC20", "https://x/n", "https://x/r");
        assert_eq!(
            sign_order(&order, "k1", Canonicalization::SortByKey),
            "7b046a9a7defd5235ad48f5526912f09"
        );
    }

    #[test]
    fn test_order_without_type_signs_four_fields() {
        let order = OrderRequest::new("1001", 10.5, "USDT-TRC20", "https://x/n", "https://x/r")
            .without_payment_type();

        let params = SignableParams::from(&order);
        assert_eq!(
            canonical_string(&params, Canonicalization::SortByKey),
            "amount=10.5&notify_url=https://x/n&order_id=1001&redirect_url=https://x/r"
        );
        assert_eq!(
            sign_order(&order, "k1", Canonicalization::SortByKey),
            "8035a1312e3808c1c6866b4266d37e55"
        );
    }

    #[test]
    fn test_verify_signature() {
        let params: SignableParams = vector_fields().into_iter().collect();
        assert!(verify_signature(
            &params,
            "k1",
            "4c0d75ac31699781c1b8f5cb78890544",
            Canonicalization::SortByKey
        ));
        assert!(!verify_signature(
            &params,
            "k1",
            "4C0D75AC31699781C1B8F5CB78890544",
            Canonicalization::SortByKey
        ));
        assert!(!verify_signature(&params, "k1", "", Canonicalization::SortByKey));
    }
}
