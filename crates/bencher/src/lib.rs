use micro_echo_http::handler::{FORM_CONTENT_TYPE, HandlerMode, JSON_CONTENT_TYPE};

#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    mode: HandlerMode,
    file: TestFile,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, mode: HandlerMode, file: TestFile) -> Self {
        Self { name, group, mode, file }
    }

    pub fn small(name: &'static str, mode: HandlerMode, file: TestFile) -> Self {
        Self::new(name, TestGroup::Small, mode, file)
    }

    pub fn large(name: &'static str, mode: HandlerMode, file: TestFile) -> Self {
        Self::new(name, TestGroup::Large, mode, file)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn mode(&self) -> HandlerMode {
        self.mode
    }

    pub fn file(&self) -> &TestFile {
        &self.file
    }

    /// A complete `POST` request carrying the file as its body.
    pub fn request(&self) -> Vec<u8> {
        let content_type = match self.mode {
            HandlerMode::JsonStream | HandlerMode::JsonBuffer => JSON_CONTENT_TYPE,
            HandlerMode::Form => FORM_CONTENT_TYPE,
        };
        let body = self.file.content();

        let mut request = format!(
            "POST /bench HTTP/1.1\r\nHost: localhost\r\nUser-Agent: bencher\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n",
            body.len()
        )
        .into_bytes();
        request.extend_from_slice(body.as_bytes());
        request
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TestFile {
    file_name: &'static str,
    content: &'static str,
}

impl TestFile {
    pub const fn new(file_name: &'static str, content: &'static str) -> Self {
        Self { file_name, content }
    }

    pub fn content(&self) -> &'static str {
        self.content
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Large,
}

impl TestGroup {
    /// Read size the request is split into, mimicking a socket delivering it piecemeal.
    pub fn read_size(self) -> usize {
        match self {
            TestGroup::Small => 64,
            TestGroup::Large => 8 * 1024,
        }
    }
}
