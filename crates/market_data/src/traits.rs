use common::traits::GatewayError;

pub trait RemoteResponse<T> {
    fn to_domain(&self) -> Result<T, GatewayError>;
}
