use campaign_etl_core::contract::OutputMessage;

pub trait Notifier {
    fn publish(&self, message: &OutputMessage) -> Result<(), String>;
}
