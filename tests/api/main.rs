mod send_notify;

// every endpoint test spawns its own `Application` on a random port, with an
// in-memory registry and its own wiremock servers standing in for the
// geolocation and Telegram APIs, so tests never share state.
//
// `redis_store` tests talk to the redis in `configuration/base.yaml`, each
// under its own random key:
//
//      docker run -p 6379:6379 -d redis:7
//
// to see the logs of a failing test:
//
//      TEST_LOG=true cargo test <test_name> | bunyan
