//! Common test utilities and fixtures.

use base64::Engine;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use p256::ecdsa::SigningKey;
use p256::pkcs8::{EncodePublicKey, LineEnding};

use saml_sp::signature::SignaturePlacement;
use saml_sp::{ResponseSigner, ResponseValidator, SAML_NS, XMLDSIG_NS};

/// Audience the SP expects, also its ACS URL.
pub const SP_ENTITY_ID: &str = "http://sp.example/saml";

/// Issuer used by the test IdP.
pub const IDP_ENTITY_ID: &str = "https://idp.example";

const SAMLP_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// Installs a test subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("saml_sp=debug")
        .with_test_writer()
        .try_init();
}

/// An identity provider with its own signing key.
pub struct TestIdp {
    signing_key: SigningKey,
    /// SubjectPublicKeyInfo PEM of the signing key.
    pub public_key_pem: String,
}

impl TestIdp {
    /// Creates an IdP with a random key.
    pub fn new() -> anyhow::Result<Self> {
        init_tracing();
        let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
        let public_key_pem = signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)?;
        Ok(Self {
            signing_key,
            public_key_pem,
        })
    }

    /// Signs the assertion inside `xml` with an enveloped signature.
    pub fn sign(&self, xml: &str) -> anyhow::Result<String> {
        Ok(ResponseSigner::new(self.signing_key.clone()).sign(xml)?)
    }

    /// Signs with the signature placed on the Response element.
    pub fn sign_at_response(&self, xml: &str) -> anyhow::Result<String> {
        Ok(ResponseSigner::new(self.signing_key.clone())
            .with_placement(SignaturePlacement::Response)
            .sign(xml)?)
    }

    /// A validator trusting this IdP and expecting [`SP_ENTITY_ID`].
    pub fn validator(&self) -> ResponseValidator {
        ResponseValidator::new(&self.public_key_pem, SP_ENTITY_ID)
    }
}

/// Parameters for a generated Response document.
#[derive(Debug, Clone)]
pub struct ResponseFixture {
    /// Prefix bound to the assertion namespace; empty means default namespace.
    pub prefix: &'static str,
    /// Declare the assertion namespace on the Response instead of the Assertion.
    pub declare_on_root: bool,
    pub issuer: String,
    pub name_id: Option<String>,
    pub audiences: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_on_or_after: DateTime<Utc>,
    pub status: Option<&'static str>,
    pub with_conditions: bool,
}

impl Default for ResponseFixture {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            prefix: "saml",
            declare_on_root: false,
            issuer: IDP_ENTITY_ID.to_string(),
            name_id: Some("user@example.com".to_string()),
            audiences: vec![SP_ENTITY_ID.to_string()],
            not_before: now - Duration::minutes(1),
            not_on_or_after: now + Duration::minutes(5),
            status: Some("urn:oasis:names:tc:SAML:2.0:status:Success"),
            with_conditions: true,
        }
    }
}

impl ResponseFixture {
    fn q(&self, local: &str) -> String {
        if self.prefix.is_empty() {
            local.to_string()
        } else {
            format!("{}:{local}", self.prefix)
        }
    }

    fn ns_decl(&self) -> String {
        if self.prefix.is_empty() {
            format!(r#" xmlns="{SAML_NS}""#)
        } else {
            format!(r#" xmlns:{}="{SAML_NS}""#, self.prefix)
        }
    }

    /// Renders the unsigned Response.
    pub fn to_xml(&self) -> String {
        let instant = |t: DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Secs, true);
        let (root_decl, assertion_decl) = if self.declare_on_root {
            (self.ns_decl(), String::new())
        } else {
            (String::new(), self.ns_decl())
        };

        let status = self
            .status
            .map(|code| format!(r#"<samlp:Status><samlp:StatusCode Value="{code}"/></samlp:Status>"#))
            .unwrap_or_default();

        let name_id = self
            .name_id
            .as_ref()
            .map(|n| format!("<{q}>{n}</{q}>", q = self.q("NameID")))
            .unwrap_or_default();

        let conditions = if self.with_conditions {
            let audiences: String = self
                .audiences
                .iter()
                .map(|a| {
                    format!(
                        "<{r}><{au}>{a}</{au}></{r}>",
                        r = self.q("AudienceRestriction"),
                        au = self.q("Audience")
                    )
                })
                .collect();
            format!(
                r#"<{c} NotBefore="{nb}" NotOnOrAfter="{noa}">{audiences}</{c}>"#,
                c = self.q("Conditions"),
                nb = instant(self.not_before),
                noa = instant(self.not_on_or_after),
            )
        } else {
            String::new()
        };

        format!(
            concat!(
                r#"<samlp:Response xmlns:samlp="{samlp}"{root_decl} ID="_resp1" Version="2.0" IssueInstant="{now}" Destination="{sp}" InResponseTo="_req1">"#,
                "{status}",
                r#"<{assertion}{assertion_decl} ID="_assert1" Version="2.0" IssueInstant="{now}">"#,
                "<{issuer}>{issuer_value}</{issuer}>",
                "<{subject}>{name_id}",
                r#"<{sc} Method="urn:oasis:names:tc:SAML:2.0:cm:bearer">"#,
                r#"<{scd} NotOnOrAfter="{noa}" Recipient="{sp}" InResponseTo="_req1"/>"#,
                "</{sc}></{subject}>",
                "{conditions}",
                r#"<{authn} AuthnInstant="{now}" SessionIndex="_session1">"#,
                "<{ctx}><{ccr}>urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport</{ccr}></{ctx}>",
                "</{authn}>",
                "<{attrs}>",
                r#"<{attr} Name="mail"><{value}>user@example.com</{value}></{attr}>"#,
                r#"<{attr} Name="groups"><{value}>admins</{value}><{value}>staff</{value}></{attr}>"#,
                "</{attrs}>",
                "</{assertion}></samlp:Response>"
            ),
            samlp = SAMLP_NS,
            root_decl = root_decl,
            now = instant(Utc::now()),
            sp = SP_ENTITY_ID,
            status = status,
            assertion = self.q("Assertion"),
            assertion_decl = assertion_decl,
            issuer = self.q("Issuer"),
            issuer_value = self.issuer,
            subject = self.q("Subject"),
            name_id = name_id,
            sc = self.q("SubjectConfirmation"),
            scd = self.q("SubjectConfirmationData"),
            noa = instant(self.not_on_or_after),
            conditions = conditions,
            authn = self.q("AuthnStatement"),
            ctx = self.q("AuthnContext"),
            ccr = self.q("AuthnContextClassRef"),
            attrs = self.q("AttributeStatement"),
            attr = self.q("Attribute"),
            value = self.q("AttributeValue"),
        )
    }
}

/// Returns the Base64 text of the first `SignatureValue` in `xml`.
pub fn signature_value_text(xml: &str) -> anyhow::Result<String> {
    let doc = saml_sp::xml::Document::parse(xml)?;
    let response = doc.root();
    let signature = response
        .child(XMLDSIG_NS, "Signature")
        .or_else(|| {
            response
                .child(SAML_NS, "Assertion")
                .and_then(|a| a.child(XMLDSIG_NS, "Signature"))
        })
        .ok_or_else(|| anyhow::anyhow!("no signature"))?;
    signature
        .child_text(XMLDSIG_NS, "SignatureValue")
        .ok_or_else(|| anyhow::anyhow!("no SignatureValue"))
}

/// Replaces the signature value with one that has a single bit flipped.
pub fn flip_signature_bit(xml: &str, bit: usize) -> anyhow::Result<String> {
    let original = signature_value_text(xml)?;
    let mut raw = base64::engine::general_purpose::STANDARD.decode(original.as_bytes())?;
    let byte = (bit / 8) % raw.len();
    raw[byte] ^= 1 << (bit % 8);
    let flipped = base64::engine::general_purpose::STANDARD.encode(&raw);
    Ok(xml.replacen(&original, &flipped, 1))
}
