pub trait ObjectStore {
    fn read_object(&self, key: &str) -> Result<Vec<u8>, String>;
    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), String>;
    fn delete_object(&self, key: &str) -> Result<(), String>;
}
