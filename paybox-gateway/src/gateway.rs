//! Merchant-level entry point wiring configuration, servers, signing and transport.

use tracing::info;

use crate::{
    config::PayboxConfig,
    error::Result,
    notification::NotificationVerifier,
    requests::{Authorization, CaptureMode, DirectOperation, DirectRequest, ReturnFields},
    server::ServerSelector,
    signing::{HmacHashGenerator, SecretStore},
    transport::{HttpTransport, Transport},
};

/// A configured Paybox merchant.
///
/// Builders borrow the gateway, so one gateway serves any number of concurrent
/// requests.
///
/// # Examples
///
/// ```rust,no_run
/// use paybox_gateway::{
///     PayboxGateway, config::PayboxConfig, requests::CaptureMode, signing::FileSecretStore,
/// };
/// use rust_decimal::Decimal;
///
/// # fn example() -> paybox_gateway::error::Result<()> {
/// let config = PayboxConfig::from_file("paybox.toml")?;
/// let gateway = PayboxGateway::with_http(config, FileSecretStore::default())?;
///
/// let form = gateway
///     .authorization(CaptureMode::WithoutCapture)
///     .set_amount(Decimal::new(1999, 2), gateway.config().currency)?
///     .set_payment_number("order-42")
///     .set_customer_email("customer@example.com")
///     .set_url()?
///     .sign()?;
///
/// println!("POST {} {}", form.url, form.form_body());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PayboxGateway<T, S> {
    config: PayboxConfig,
    selector: ServerSelector,
    verifier: NotificationVerifier<S>,
    transport: T,
}

impl<S: SecretStore> PayboxGateway<HttpTransport, S> {
    /// Creates a gateway posting over HTTPS with the `[transport]` settings.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::ConfigError`](crate::PayboxError::ConfigError) for an
    /// invalid configuration and HTTP client construction errors.
    pub fn with_http(config: PayboxConfig, store: S) -> Result<Self> {
        let transport = HttpTransport::with_config(&config.transport)?;
        Self::new(config, transport, store)
    }
}

impl<T: Transport, S: SecretStore> PayboxGateway<T, S> {
    /// Creates a gateway.
    ///
    /// The HMAC secret is read from `store` under `config.hmac_key` at each
    /// signing, never at construction.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::ConfigError`](crate::PayboxError::ConfigError) for an
    /// invalid configuration.
    pub fn new(config: PayboxConfig, transport: T, store: S) -> Result<Self> {
        config.validate()?;
        let selector = config.selector()?;
        let generator = HmacHashGenerator::new(store, config.hmac_key.clone());
        let schema = config.notification.schema();
        let verifier = NotificationVerifier::new(generator, schema, &config.notification);

        info!(
            site = %config.site,
            rank = %config.rank,
            test = config.test,
            endpoints = selector.endpoints().len(),
            protocol = transport.protocol_name(),
            "paybox gateway ready"
        );

        Ok(Self { config, selector, verifier, transport })
    }

    /// Merchant configuration.
    #[must_use]
    pub const fn config(&self) -> &PayboxConfig {
        &self.config
    }

    /// Server selector.
    #[must_use]
    pub const fn selector(&self) -> &ServerSelector {
        &self.selector
    }

    /// HMAC generator bound to the merchant key.
    #[must_use]
    pub const fn generator(&self) -> &HmacHashGenerator<S> {
        self.verifier.generator()
    }

    /// Callback verifier for forms built with the configured return-field schema.
    #[must_use]
    pub const fn verifier(&self) -> &NotificationVerifier<S> {
        &self.verifier
    }

    /// Callback verifier for forms built with
    /// [`Authorization::set_return_fields`] and `schema`.
    ///
    /// The signature variable is renamed to `notification.signature_field`, as it
    /// is on the form.
    #[must_use]
    pub fn verifier_for(&self, schema: ReturnFields) -> NotificationVerifier<&S> {
        NotificationVerifier::new(self.generator().by_ref(), schema, &self.config.notification)
    }

    /// Underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Starts a Paybox System payment form.
    #[must_use]
    pub fn authorization(&self, mode: CaptureMode) -> Authorization<'_, S> {
        Authorization::new(&self.config, &self.selector, self.generator(), mode)
    }

    /// Starts a Paybox Direct request.
    #[must_use]
    pub fn direct(&self, operation: DirectOperation) -> DirectRequest<'_, T> {
        DirectRequest::new(operation, &self.config, &self.selector, &self.transport)
    }

    /// Starts the capture of an authorization made without capture.
    #[must_use]
    pub fn capture(&self) -> DirectRequest<'_, T> {
        self.direct(DirectOperation::Capture)
    }

    /// Starts a cancellation.
    #[must_use]
    pub fn cancel(&self) -> DirectRequest<'_, T> {
        self.direct(DirectOperation::Cancel)
    }

    /// Starts a refund.
    #[must_use]
    pub fn refund(&self) -> DirectRequest<'_, T> {
        self.direct(DirectOperation::Refund)
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::{
        PayboxError, params::ParameterMap, requests::ReturnField, signing::StaticSecretStore,
    };

    #[derive(Debug)]
    struct NoopTransport;

    impl Transport for NoopTransport {
        async fn post<'a>(&'a self, _url: &'a Url, _params: &'a ParameterMap) -> Result<String> {
            Err(PayboxError::TransportFailure("offline".to_owned()))
        }

        fn protocol_name(&self) -> &'static str {
            "noop"
        }
    }

    fn gateway() -> PayboxGateway<NoopTransport, StaticSecretStore> {
        let config = PayboxConfig::for_tests();
        let secret = hex::encode("secret");
        let store = StaticSecretStore::new().with_secret(config.hmac_key.clone(), secret);
        PayboxGateway::new(config, NoopTransport, store).unwrap()
    }

    fn signed_callback(gateway: &PayboxGateway<NoopTransport, StaticSecretStore>) -> String {
        let fields: ParameterMap =
            [("montant", "1000"), ("ref", "order-1"), ("appel", "0000783458")]
                .into_iter()
                .collect();
        let signature = gateway.generator().get(&fields).unwrap();
        format!("{}&sign={signature}", fields.to_form_body())
    }

    fn custom_schema() -> ReturnFields {
        [
            ("montant", ReturnField::Amount),
            ("ref", ReturnField::Reference),
            ("appel", ReturnField::CallNumber),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = PayboxConfig::for_tests();
        config.site = "12".to_owned();
        let result = PayboxGateway::new(config, NoopTransport, StaticSecretStore::new());
        assert!(matches!(result, Err(PayboxError::ConfigError(_))));
    }

    #[test]
    fn test_direct_builders_carry_operation() {
        let gateway = gateway();
        assert_eq!(gateway.capture().operation(), DirectOperation::Capture);
        assert_eq!(gateway.cancel().operation(), DirectOperation::Cancel);
        assert_eq!(gateway.refund().operation(), DirectOperation::Refund);
    }

    #[test]
    fn test_authorization_signed_with_gateway_key() {
        let gateway = gateway();
        let form = gateway
            .authorization(CaptureMode::WithCapture)
            .set_amount(rust_decimal::Decimal::new(1000, 2), gateway.config().currency)
            .unwrap()
            .set_payment_number("order-1")
            .set_customer_email("customer@example.com")
            .set_url()
            .unwrap()
            .sign()
            .unwrap();

        let mut params = form.params.clone();
        let signature = params.remove(crate::signing::HMAC_FIELD).unwrap();
        assert!(gateway.generator().verify(&params, &signature).unwrap());
    }

    #[test]
    fn test_form_and_verifier_share_configured_schema() {
        let mut config = PayboxConfig::for_tests();
        config.notification.signature_field = "sign".to_owned();
        config.notification.return_fields = Some(custom_schema());
        let secret = hex::encode("secret");
        let store = StaticSecretStore::new().with_secret(config.hmac_key.clone(), secret);
        let gateway = PayboxGateway::new(config, NoopTransport, store).unwrap();

        let params = gateway
            .authorization(CaptureMode::WithCapture)
            .set_amount(rust_decimal::Decimal::new(1000, 2), gateway.config().currency)
            .unwrap()
            .set_payment_number("order-1")
            .set_customer_email("customer@example.com")
            .parameters()
            .unwrap();
        assert_eq!(params.get("PBX_RETOUR"), Some("montant:M;ref:R;appel:T;sign:K"));

        let notification = gateway.verifier().verify_query(&signed_callback(&gateway));
        assert!(notification.is_verified());
        assert_eq!(notification.order_number(), Some("order-1"));
        assert_eq!(notification.call_number(), Some("0000783458"));
    }

    #[test]
    fn test_verifier_for_form_schema() {
        let mut config = PayboxConfig::for_tests();
        config.notification.signature_field = "sign".to_owned();
        let secret = hex::encode("secret");
        let store = StaticSecretStore::new().with_secret(config.hmac_key.clone(), secret);
        let gateway = PayboxGateway::new(config, NoopTransport, store).unwrap();

        let form =
            gateway.authorization(CaptureMode::WithCapture).set_return_fields(custom_schema());
        assert_eq!(form.return_fields().to_pbx_retour(), "montant:M;ref:R;appel:T;sign:K");

        let verifier = gateway.verifier_for(custom_schema());
        assert_eq!(verifier.signature_field(), "sign");

        let notification = verifier.verify_query(&signed_callback(&gateway));
        assert!(notification.is_verified());
        assert_eq!(notification.amount(), Some("1000"));
        assert_eq!(notification.order_number(), Some("order-1"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_retryable() {
        let gateway = gateway();
        let err = gateway
            .capture()
            .set_amount(rust_decimal::Decimal::new(1000, 2), gateway.config().currency)
            .unwrap()
            .set_payment_number("order-1")
            .set_day_request_number(1)
            .unwrap()
            .set_paybox_call_number("0000783458")
            .set_paybox_transaction_number("0000571234")
            .set_url()
            .unwrap()
            .send(None)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }
}
