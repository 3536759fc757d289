fn main() {
    let protos = [
        "proto/real_data.proto",
        "proto/real_data_new.proto",
        "proto/get_config.proto",
        "proto/set_config.proto",
        "proto/network_info.proto",
        "proto/app_information_data.proto",
        "proto/app_get_hist_power.proto",
        "proto/command.proto",
        "proto/heartbeat.proto",
        "proto/gateway.proto",
        "proto/energy_storage.proto",
    ];

    let mut config = prost_build::Config::new();
    config.type_attribute(".", "#[derive(serde::Serialize)]");
    config
        .compile_protos(&protos, &["proto/"])
        .expect("failed to compile DTU protobuf schemas");

    for proto in protos {
        println!("cargo:rerun-if-changed={proto}");
    }
}
