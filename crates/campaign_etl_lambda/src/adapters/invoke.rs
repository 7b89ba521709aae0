pub trait FunctionInvoker {
    fn invoke_async(&self, payload: &[u8]) -> Result<(), String>;
}
