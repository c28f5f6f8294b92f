//! Response validation tests against responses signed by a test IdP.

use chrono::{DateTime, Duration, TimeZone, Utc};

use saml_sp::{
    process_response, status_codes, ResponseValidator, SamlError, SamlErrorKind, SubjectConfirmation, SAML_NS,
};

use crate::common::{flip_signature_bit, ResponseFixture, TestIdp, IDP_ENTITY_ID, SP_ENTITY_ID};

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// A fixture valid from `fixed_now() - 1m` until `fixed_now() + 5m`.
fn fixture() -> ResponseFixture {
    ResponseFixture {
        not_before: fixed_now() - Duration::minutes(1),
        not_on_or_after: fixed_now() + Duration::minutes(5),
        ..ResponseFixture::default()
    }
}

fn rejection_kind(idp: &TestIdp, xml: &str) -> SamlErrorKind {
    match idp.validator().process_response_at(xml, fixed_now()) {
        Ok(assertion) => panic!("accepted assertion {}", assertion.id),
        Err(e) => {
            assert!(e.is_authentication_rejection(), "{e}");
            e.kind()
        }
    }
}

/// Tests that a well-formed signed response yields the assertion fields.
#[test]
fn test_valid_response_is_accepted() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    let signed = idp.sign(&fixture().to_xml())?;

    let assertion = idp.validator().process_response_at(&signed, fixed_now())?;

    assert_eq!(assertion.id, "_assert1");
    assert_eq!(assertion.issuer, IDP_ENTITY_ID);
    assert_eq!(assertion.subject.name_id, "user@example.com");
    assert_eq!(assertion.subject.confirmation.method, SubjectConfirmation::BEARER);
    assert_eq!(assertion.subject.confirmation.confirmation_data.recipient, SP_ENTITY_ID);
    assert_eq!(assertion.authn_statement.session_index.as_deref(), Some("_session1"));
    assert_eq!(assertion.attribute("mail"), Some("user@example.com"));
    assert_eq!(assertion.attribute("groups"), Some("admins"));

    let conditions = assertion.conditions.ok_or_else(|| anyhow::anyhow!("conditions missing"))?;
    assert_eq!(conditions.not_on_or_after, fixed_now() + Duration::minutes(5));
    assert!(conditions.allows_audience(SP_ENTITY_ID));
    Ok(())
}

/// Tests the one-call entry point with the current clock.
#[test]
fn test_process_response_uses_current_time() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    let signed = idp.sign(&ResponseFixture::default().to_xml())?;

    let assertion = process_response(&signed, &idp.public_key_pem, SP_ENTITY_ID)?;
    assert_eq!(assertion.issuer, IDP_ENTITY_ID);
    Ok(())
}

/// Tests that a signature on the Response element covers the assertion.
#[test]
fn test_response_level_signature() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    let signed = idp.sign_at_response(&fixture().to_xml())?;
    assert!(signed.find("<ds:Signature") < signed.find("<saml:Assertion"));

    let assertion = idp.validator().process_response_at(&signed, fixed_now())?;
    assert_eq!(assertion.subject.name_id, "user@example.com");

    let tampered = signed.replacen(">user@example.com</saml:NameID>", ">root@example.com</saml:NameID>", 1);
    assert_eq!(rejection_kind(&idp, &tampered), SamlErrorKind::SignatureVerification);
    Ok(())
}

/// Tests that any single flipped bit in the signature value is rejected.
#[test]
fn test_flipped_signature_bits_are_rejected() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    let signed = idp.sign(&fixture().to_xml())?;

    for bit in (0..512).step_by(13) {
        let flipped = flip_signature_bit(&signed, bit)?;
        assert_ne!(flipped, signed);
        assert_eq!(rejection_kind(&idp, &flipped), SamlErrorKind::SignatureVerification, "bit {bit}");
    }
    Ok(())
}

/// Tests that edits to signed assertion content invalidate the signature.
#[test]
fn test_tampered_assertion_is_rejected() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    let signed = idp.sign(&fixture().to_xml())?;

    for (from, to) in [
        (">user@example.com</saml:NameID>", ">root@example.com</saml:NameID>"),
        (">admins</saml:AttributeValue>", ">superusers</saml:AttributeValue>"),
        (r#"SessionIndex="_session1""#, r#"SessionIndex="_session2""#),
        ("<saml:Subject>", "<saml:Subject>\n"),
    ] {
        let tampered = signed.replacen(from, to, 1);
        assert_ne!(tampered, signed, "{from}");
        assert_eq!(rejection_kind(&idp, &tampered), SamlErrorKind::SignatureVerification, "{from}");
    }
    Ok(())
}

/// Tests that widening the validity window after signing is detected.
#[test]
fn test_extended_conditions_are_rejected() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    let expired = ResponseFixture {
        not_before: fixed_now() - Duration::minutes(10),
        not_on_or_after: fixed_now() - Duration::minutes(5),
        ..fixture()
    };
    let signed = idp.sign(&expired.to_xml())?;
    assert_eq!(rejection_kind(&idp, &signed), SamlErrorKind::ConditionsInvalid);

    let extended = signed.replace("2024-03-01T11:55:00Z", "2024-03-01T12:55:00Z");
    assert_eq!(rejection_kind(&idp, &extended), SamlErrorKind::SignatureVerification);
    Ok(())
}

/// Tests that a response signed by another key is rejected.
#[test]
fn test_untrusted_key_is_rejected() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    let impostor = TestIdp::new()?;
    let signed = impostor.sign(&fixture().to_xml())?;

    assert_eq!(rejection_kind(&idp, &signed), SamlErrorKind::SignatureVerification);

    let unusable = ResponseValidator::new("not a key", SP_ENTITY_ID);
    let err = unusable.process_response_at(&signed, fixed_now()).unwrap_err();
    assert_eq!(err.kind(), SamlErrorKind::SignatureVerification);
    Ok(())
}

/// Tests the half-open validity window with and without clock skew.
#[test]
fn test_conditions_window() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    let signed = idp.sign(&fixture().to_xml())?;
    let validator = idp.validator();

    let not_before = fixed_now() - Duration::minutes(1);
    let not_on_or_after = fixed_now() + Duration::minutes(5);

    assert!(validator.process_response_at(&signed, not_before).is_ok());
    assert!(validator
        .process_response_at(&signed, not_on_or_after - Duration::seconds(1))
        .is_ok());

    for now in [not_before - Duration::seconds(1), not_on_or_after, not_on_or_after + Duration::hours(1)] {
        let err = validator.process_response_at(&signed, now).unwrap_err();
        assert_eq!(err.kind(), SamlErrorKind::ConditionsInvalid, "{now}");
    }

    let lenient = idp.validator().with_clock_skew(Duration::minutes(2));
    assert!(lenient.process_response_at(&signed, not_on_or_after).is_ok());
    assert!(lenient
        .process_response_at(&signed, not_before - Duration::minutes(1))
        .is_ok());
    assert!(lenient
        .process_response_at(&signed, not_on_or_after + Duration::minutes(2))
        .is_err());
    Ok(())
}

/// Tests that the audience must name this SP exactly.
#[test]
fn test_audience_restrictions() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;

    let other = ResponseFixture {
        audiences: vec!["http://other-sp.example/saml".to_string()],
        ..fixture()
    };
    let signed = idp.sign(&other.to_xml())?;
    match idp.validator().process_response_at(&signed, fixed_now()) {
        Err(SamlError::AudienceMismatch { expected }) => assert_eq!(expected, SP_ENTITY_ID),
        other => panic!("{other:?}"),
    }

    let none = ResponseFixture {
        audiences: Vec::new(),
        ..fixture()
    };
    let signed = idp.sign(&none.to_xml())?;
    assert_eq!(rejection_kind(&idp, &signed), SamlErrorKind::AudienceMismatch);

    let several = ResponseFixture {
        audiences: vec!["urn:first".to_string(), SP_ENTITY_ID.to_string()],
        ..fixture()
    };
    let signed = idp.sign(&several.to_xml())?;
    assert!(idp.validator().process_response_at(&signed, fixed_now()).is_ok());

    let trailing_slash = ResponseValidator::new(&idp.public_key_pem, format!("{SP_ENTITY_ID}/"));
    let err = trailing_slash.process_response_at(&signed, fixed_now()).unwrap_err();
    assert_eq!(err.kind(), SamlErrorKind::AudienceMismatch);
    Ok(())
}

/// Tests that the window is checked before the audience.
#[test]
fn test_expired_and_misaddressed_reports_window() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    let response = ResponseFixture {
        audiences: vec!["urn:someone-else".to_string()],
        not_on_or_after: fixed_now(),
        ..fixture()
    };
    let signed = idp.sign(&response.to_xml())?;
    assert_eq!(rejection_kind(&idp, &signed), SamlErrorKind::ConditionsInvalid);
    Ok(())
}

/// Tests that signed assertions lacking required fields are still rejected.
#[test]
fn test_critical_fields_are_required() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;

    let no_issuer = ResponseFixture {
        issuer: "  ".to_string(),
        ..fixture()
    };
    let signed = idp.sign(&no_issuer.to_xml())?;
    match idp.validator().process_response_at(&signed, fixed_now()) {
        Err(SamlError::CriticalFieldMissing(field)) => assert_eq!(field, "Issuer"),
        other => panic!("{other:?}"),
    }

    let no_name_id = ResponseFixture {
        name_id: None,
        ..fixture()
    };
    let signed = idp.sign(&no_name_id.to_xml())?;
    match idp.validator().process_response_at(&signed, fixed_now()) {
        Err(SamlError::CriticalFieldMissing(field)) => assert_eq!(field, "NameID"),
        other => panic!("{other:?}"),
    }
    Ok(())
}

/// Tests that deeply nested content is refused before canonicalization.
#[test]
fn test_deeply_nested_assertion_is_rejected() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    let signed = idp.sign(&fixture().to_xml())?;
    let depth = 200_000;
    let nested = signed.replacen(
        "</saml:Assertion>",
        &format!("{}{}</saml:Assertion>", "<x>".repeat(depth), "</x>".repeat(depth)),
        1,
    );
    assert_eq!(rejection_kind(&idp, &nested), SamlErrorKind::Parse);
    Ok(())
}

/// Tests that a missing Conditions element is a parse failure.
#[test]
fn test_missing_conditions() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    let response = ResponseFixture {
        with_conditions: false,
        ..fixture()
    };
    let signed = idp.sign(&response.to_xml())?;
    assert_eq!(rejection_kind(&idp, &signed), SamlErrorKind::ConditionsParse);
    Ok(())
}

/// Tests that a non-success status short-circuits before the signature.
#[test]
fn test_failed_status_is_rejected() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    let denied = ResponseFixture {
        status: Some(status_codes::RESPONDER),
        ..fixture()
    };
    let signed = idp.sign(&denied.to_xml())?;
    assert_eq!(rejection_kind(&idp, &signed), SamlErrorKind::StatusNotSuccess);

    let unsigned = ResponseFixture {
        status: Some(status_codes::REQUESTER),
        ..fixture()
    };
    assert_eq!(rejection_kind(&idp, &unsigned.to_xml()), SamlErrorKind::StatusNotSuccess);

    let no_status = ResponseFixture {
        status: None,
        ..fixture()
    };
    let signed = idp.sign(&no_status.to_xml())?;
    assert!(idp.validator().process_response_at(&signed, fixed_now()).is_ok());
    Ok(())
}

/// Tests that unsigned or unreadable signatures are reported as location errors.
#[test]
fn test_signature_must_be_present() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    assert_eq!(rejection_kind(&idp, &fixture().to_xml()), SamlErrorKind::SignatureLocation);

    let signed = idp.sign(&fixture().to_xml())?;
    let value = crate::common::signature_value_text(&signed)?;
    let garbled = signed.replacen(&value, "%%%not base64%%%", 1);
    assert_eq!(rejection_kind(&idp, &garbled), SamlErrorKind::SignatureLocation);

    let emptied = signed.replacen(&value, "", 1);
    assert_eq!(rejection_kind(&idp, &emptied), SamlErrorKind::SignatureLocation);
    Ok(())
}

/// Tests that only exclusive canonicalization is honoured.
#[test]
fn test_unsupported_canonicalization() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    let signed = idp.sign(&fixture().to_xml())?;
    let inclusive = signed.replace(
        r#"<ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>"#,
        r#"<ds:CanonicalizationMethod Algorithm="http://www.w3.org/TR/2001/REC-xml-c14n-20010315"/>"#,
    );
    assert_ne!(inclusive, signed);
    assert_eq!(rejection_kind(&idp, &inclusive), SamlErrorKind::Canonicalization);
    Ok(())
}

/// Tests that a signature method other than ECDSA-SHA256 is refused.
#[test]
fn test_unsupported_signature_method() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    let signed = idp.sign(&fixture().to_xml())?;
    let rsa = signed.replace(
        "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256",
        "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
    );
    assert_ne!(rsa, signed);
    assert_eq!(rejection_kind(&idp, &rsa), SamlErrorKind::SignatureVerification);
    Ok(())
}

/// Tests that the assertion may use any prefix or the default namespace.
#[test]
fn test_namespace_prefix_independence() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    for prefix in ["saml", "saml2", "a", ""] {
        for declare_on_root in [false, true] {
            let response = ResponseFixture {
                prefix,
                declare_on_root,
                ..fixture()
            };
            let signed = idp.sign(&response.to_xml())?;
            let assertion = idp
                .validator()
                .process_response_at(&signed, fixed_now())
                .map_err(|e| anyhow::anyhow!("prefix {prefix:?} on root {declare_on_root}: {e}"))?;
            assert_eq!(assertion.subject.name_id, "user@example.com");
        }
    }
    Ok(())
}

/// Tests that serialization changes outside the canonical form keep the signature valid.
#[test]
fn test_signature_survives_reserialization() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    let signed = idp.sign(&fixture().to_xml())?;

    let saml_decl = format!(r#" xmlns:saml="{SAML_NS}""#);
    let moved = signed
        .replacen(&saml_decl, "", 1)
        .replacen("<samlp:Response ", &format!("<samlp:Response{saml_decl} "), 1);
    let unused = signed.replacen("<saml:Assertion ", r#"<saml:Assertion xmlns:extra="urn:unused" "#, 1);
    let quoted = signed.replacen(r#"ID="_assert1""#, "ID='_assert1'", 1);
    let self_closing = signed.replacen(
        r#"InResponseTo="_req1"/>"#,
        r#"InResponseTo="_req1"></saml:SubjectConfirmationData>"#,
        1,
    );
    let value = crate::common::signature_value_text(&signed)?;
    let (head, tail) = value.split_at(value.len() / 2);
    let wrapped = signed.replacen(&value, &format!("\n  {head}\n  {tail}\n"), 1);
    let declared = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{signed}");

    for variant in [&moved, &unused, &quoted, &self_closing, &wrapped, &declared] {
        assert_ne!(variant, &signed);
        idp.validator()
            .process_response_at(variant, fixed_now())
            .map_err(|e| anyhow::anyhow!("{e}: {variant}"))?;
    }
    Ok(())
}

/// Tests that one validator can be shared across threads.
#[test]
fn test_validator_is_shareable() -> anyhow::Result<()> {
    let idp = TestIdp::new()?;
    let validator = idp.validator();
    let good = idp.sign(&fixture().to_xml())?;
    let bad = flip_signature_bit(&good, 100)?;

    std::thread::scope(|scope| {
        for i in 0..8 {
            let xml = if i % 2 == 0 { &good } else { &bad };
            let validator = &validator;
            scope.spawn(move || {
                let result = validator.process_response_at(xml, fixed_now());
                assert_eq!(result.is_ok(), i % 2 == 0);
            });
        }
    });
    Ok(())
}
