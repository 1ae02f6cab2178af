#[test]
fn test_compile_pass() {
    let t = trybuild::TestCases::new();
    t.pass("compile-pass/*.rs");
}

#[test]
fn test_compile_fail() {
    let t = trybuild::TestCases::new();
    t.compile_fail("compile-fail/*.rs");
}
