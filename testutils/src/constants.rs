pub const TEST_CLUSTER: &str = "test-cluster";
pub const TEST_NAMESPACE: &str = "test-namespace";
pub const TEST_DEPLOYMENT: &str = "the-deployment";
pub const TEST_POD: &str = "the-pod";
pub const TEST_NODE: &str = "node-1";
